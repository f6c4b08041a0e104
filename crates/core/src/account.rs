use std::fmt;

/// Index of an account within a [`ChartOfAccounts`] arena.
///
/// Ids are only meaningful for the chart that issued them; they are plain
/// indices, so holding one never keeps the chart alive or borrows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountId(pub(crate) usize);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Account {
    pub number: String,
    pub name: String,
    parent: Option<AccountId>,
    children: Vec<AccountId>,
}

impl Account {
    fn new(number: &str, name: &str, parent: Option<AccountId>) -> Self {
        Account {
            number: number.to_string(),
            name: name.to_string(),
            parent,
            children: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<AccountId> {
        self.parent
    }

    pub fn children(&self) -> &[AccountId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// The full chart of accounts as an arena: parent/child links are indices,
/// so the bidirectional hierarchy has no ownership cycles.
///
/// Built once at startup and treated as read-only for the rest of the run.
/// Account numbers are not checked for uniqueness; lookups return the first
/// match in depth-first order.
#[derive(Debug, Clone, Default)]
pub struct ChartOfAccounts {
    nodes: Vec<Account>,
    roots: Vec<AccountId>,
}

impl ChartOfAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_root(&mut self, number: &str, name: &str) -> AccountId {
        let id = AccountId(self.nodes.len());
        self.nodes.push(Account::new(number, name, None));
        self.roots.push(id);
        id
    }

    pub fn add_child(&mut self, parent: AccountId, number: &str, name: &str) -> AccountId {
        let id = AccountId(self.nodes.len());
        self.nodes.push(Account::new(number, name, Some(parent)));
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn account(&self, id: AccountId) -> &Account {
        &self.nodes[id.0]
    }

    pub fn roots(&self) -> &[AccountId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_leaf(&self, id: AccountId) -> bool {
        self.nodes[id.0].is_leaf()
    }

    /// Depth-first search across roots in order; first structural match wins.
    /// O(n) in the account count.
    pub fn find_account(&self, number: &str) -> Option<AccountId> {
        self.dfs_ids().find(|id| self.nodes[id.0].number == number)
    }

    /// All zero-child accounts in depth-first order, preserving child-list
    /// order. Only these may receive transaction matches.
    pub fn get_leaf_accounts(&self) -> Vec<AccountId> {
        self.dfs_ids().filter(|id| self.nodes[id.0].is_leaf()).collect()
    }

    /// Ancestor names root→self joined with " > ".
    pub fn full_name(&self, id: AccountId) -> String {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(c) = current {
            chain.push(self.nodes[c.0].name.as_str());
            current = self.nodes[c.0].parent;
        }
        chain.reverse();
        chain.join(" > ")
    }

    fn dfs_ids(&self) -> impl Iterator<Item = AccountId> + '_ {
        let mut stack: Vec<AccountId> = self.roots.iter().rev().copied().collect();
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            stack.extend(self.nodes[id.0].children.iter().rev());
            Some(id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1000 Root
    ///   1100 Child 1
    ///   1200 Child 2
    ///     1210 Grandchild
    fn sample_chart() -> ChartOfAccounts {
        let mut chart = ChartOfAccounts::new();
        let root = chart.add_root("1000", "Root");
        chart.add_child(root, "1100", "Child 1");
        let child2 = chart.add_child(root, "1200", "Child 2");
        chart.add_child(child2, "1210", "Grandchild");
        chart
    }

    #[test]
    fn find_account_by_number() {
        let chart = sample_chart();
        let id = chart.find_account("1210").unwrap();
        assert_eq!(chart.account(id).name, "Grandchild");
    }

    #[test]
    fn find_account_missing_number() {
        let chart = sample_chart();
        assert!(chart.find_account("9999").is_none());
    }

    #[test]
    fn find_account_duplicate_returns_first_in_dfs_order() {
        let mut chart = ChartOfAccounts::new();
        let root = chart.add_root("1000", "Root");
        chart.add_child(root, "1100", "First");
        chart.add_child(root, "1100", "Second");
        let id = chart.find_account("1100").unwrap();
        assert_eq!(chart.account(id).name, "First");
    }

    #[test]
    fn leaf_iff_no_children() {
        let chart = sample_chart();
        let root = chart.find_account("1000").unwrap();
        let grandchild = chart.find_account("1210").unwrap();
        assert!(!chart.is_leaf(root));
        assert!(chart.is_leaf(grandchild));
    }

    #[test]
    fn leaf_accounts_in_dfs_order() {
        let chart = sample_chart();
        let leaves: Vec<&str> = chart
            .get_leaf_accounts()
            .iter()
            .map(|&id| chart.account(id).number.as_str())
            .collect();
        assert_eq!(leaves, vec!["1100", "1210"]);
    }

    #[test]
    fn full_name_joins_ancestor_chain() {
        let chart = sample_chart();
        let grandchild = chart.find_account("1210").unwrap();
        assert_eq!(chart.full_name(grandchild), "Root > Child 2 > Grandchild");
        let root = chart.find_account("1000").unwrap();
        assert_eq!(chart.full_name(root), "Root");
    }

    #[test]
    fn add_child_sets_parent_link() {
        let chart = sample_chart();
        let child = chart.find_account("1200").unwrap();
        let parent = chart.account(child).parent().unwrap();
        assert_eq!(chart.account(parent).number, "1000");
    }

    #[test]
    fn multiple_roots_searched_in_order() {
        let mut chart = ChartOfAccounts::new();
        chart.add_root("1000", "Assets");
        chart.add_root("6000", "Expenses");
        assert!(chart.find_account("6000").is_some());
        assert_eq!(chart.get_leaf_accounts().len(), 2);
    }
}
