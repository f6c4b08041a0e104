//! LLM fallback matcher.
//!
//! The network call sits behind [`CompletionClient`] so the matching logic
//! can be exercised with stub responses. Every failure mode — transport
//! error, malformed response, unknown or non-leaf account — is logged and
//! leaves the transaction untouched; the engine sees a clean no-op.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use ledgermatch_core::{AccountId, ChartOfAccounts, MatchSource, Transaction};

use crate::matcher::{validate_match, MatchError, Matcher};

/// Confidence used when the model names an account but omits a score.
pub const DEFAULT_LLM_CONFIDENCE: f64 = 0.75;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("response contained no completion")]
    EmptyResponse,
}

/// External-call seam: prompt in, raw completion text out.
pub trait CompletionClient {
    fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Blocking OpenAI-compatible chat client. The API key is injected by the
/// caller; this type never consults the environment.
pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    api_key: String,
    config: LlmConfig,
}

impl OpenAiClient {
    pub fn new(api_key: String, config: LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(OpenAiClient { http, api_key, config })
    }
}

impl CompletionClient for OpenAiClient {
    fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.1,
            max_tokens: 20,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response.json()?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse)
    }
}

/// Second-pass matcher that asks an LLM to pick a leaf account.
pub struct LlmMatcher<C> {
    chart: Arc<ChartOfAccounts>,
    client: C,
}

impl<C: CompletionClient> LlmMatcher<C> {
    pub fn new(chart: Arc<ChartOfAccounts>, client: C) -> Self {
        LlmMatcher { chart, client }
    }

    fn build_prompt(&self, tx: &Transaction) -> String {
        let mut prompt = String::from(
            "You are an expert accounting assistant. Match the following \
             bank transaction to the most appropriate account from the chart \
             of accounts.\n\nChart of Accounts (leaf accounts):\n",
        );
        for id in self.chart.get_leaf_accounts() {
            let account = self.chart.account(id);
            prompt.push_str(&format!(
                "- {}: {}\n",
                account.number,
                self.chart.full_name(id)
            ));
        }
        prompt.push_str(&format!(
            "\nTransaction:\n- Description: {}\n- Amount: {}\n- Type: {}\n- Category: {}\n- Date: {}\n\n\
             Respond with exactly two lines:\n\
             line 1: the account number\n\
             line 2: your confidence as an integer from 0 to 100\n",
            tx.description,
            tx.amount,
            tx.tx_type,
            tx.category.as_deref().unwrap_or("-"),
            tx.transaction_date,
        ));
        prompt
    }
}

/// Parse the two-line reply: account number, then integer confidence 0-100.
/// A missing confidence line falls back to [`DEFAULT_LLM_CONFIDENCE`].
fn parse_response(output: &str) -> Option<(String, f64)> {
    let mut lines = output.lines().filter(|l| !l.trim().is_empty());

    let first = lines.next()?;
    let number: String = first.chars().filter(|c| c.is_ascii_digit()).collect();
    if number.is_empty() {
        return None;
    }

    let confidence = match lines.next() {
        Some(line) => {
            let digits: String = line.chars().filter(|c| c.is_ascii_digit()).collect();
            let score: u32 = digits.parse().ok()?;
            if score > 100 {
                return None;
            }
            f64::from(score) / 100.0
        }
        None => DEFAULT_LLM_CONFIDENCE,
    };

    Some((number, confidence))
}

impl<C: CompletionClient> Matcher for LlmMatcher<C> {
    fn name(&self) -> &'static str {
        "llm"
    }

    fn match_transaction(&self, tx: &mut Transaction) -> Result<(), MatchError> {
        let prompt = self.build_prompt(tx);

        let output = match self.client.complete(&prompt) {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(description = %tx.description, error = %e, "LLM call failed");
                return Ok(());
            }
        };

        let Some((number, confidence)) = parse_response(&output) else {
            tracing::warn!(
                description = %tx.description,
                output = %output,
                "could not parse LLM response"
            );
            return Ok(());
        };

        let Some(account) = self.chart.find_account(&number) else {
            tracing::warn!(%number, "LLM returned an account not in the chart");
            return Ok(());
        };
        if !validate_match(&self.chart, account) {
            tracing::warn!(%number, "LLM returned a non-leaf account");
            return Ok(());
        }

        tracing::info!(
            description = %tx.description,
            %number,
            confidence,
            "LLM suggested match"
        );
        tx.add_match(account, confidence, MatchSource::Llm);
        Ok(())
    }

    fn match_confidence(&self, _tx: &Transaction, account: AccountId) -> f64 {
        if validate_match(&self.chart, account) {
            DEFAULT_LLM_CONFIDENCE
        } else {
            0.0
        }
    }
}
