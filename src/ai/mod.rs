//! Text-generation gateway: provider strategy, live HTTP calls, and the
//! deterministic fallback.
//!
//! The provider is selected once at construction time so tests can inject
//! the mock deterministically. Catalog code only ever calls
//! [`Gateway::generate_or_fallback`], which cannot fail: a live-provider
//! error is logged and replaced by the mock generator's output. AI
//! features degrade, they never hard-fail a book lookup.

pub mod interpret;
pub mod mock;
pub mod prompt;

use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use crate::config::AiConfig;

/// Errors from the generation subsystem. These never escape the gateway's
/// fallback entry point.
#[derive(Debug, Error, Diagnostic)]
pub enum AiError {
    #[error("API key for {provider} is not set")]
    #[diagnostic(
        code(biblion::ai::missing_key),
        help("Export {env_var} or switch the configured provider to \"mock\".")
    )]
    MissingApiKey {
        provider: &'static str,
        env_var: &'static str,
    },

    #[error("{provider} request failed: {message}")]
    #[diagnostic(
        code(biblion::ai::request_failed),
        help("Check network connectivity and the provider's status page.")
    )]
    RequestFailed {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} returned status {status}")]
    #[diagnostic(
        code(biblion::ai::bad_status),
        help("Verify the API key and configured model name.")
    )]
    BadStatus { provider: &'static str, status: u16 },

    #[error("failed to read {provider} response: {message}")]
    #[diagnostic(code(biblion::ai::parse_error))]
    ParseError {
        provider: &'static str,
        message: String,
    },
}

pub type AiResult<T> = std::result::Result<T, AiError>;

/// The selected generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Mock,
    OpenAi,
    Anthropic,
}

impl Provider {
    /// Resolve a configured provider name. Unknown names resolve to the
    /// mock, matching how unset providers behaved historically.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "openai" => Self::OpenAi,
            "anthropic" => Self::Anthropic,
            _ => Self::Mock,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The operation a generation request originates from. The mock generator
/// consumes this (it works from the user's words, not the instruction
/// boilerplate); live providers consume the prompt text.
#[derive(Debug, Clone)]
pub enum PromptContext {
    Search {
        query: String,
    },
    Enrich {
        title: String,
        author: String,
        description: Option<String>,
    },
}

/// A single generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub context: PromptContext,
}

impl GenerationRequest {
    pub fn search(query: &str) -> Self {
        Self {
            prompt: prompt::build_search_prompt(query),
            context: PromptContext::Search {
                query: query.to_string(),
            },
        }
    }

    pub fn enrich(title: &str, author: &str, description: Option<&str>) -> Self {
        Self {
            prompt: prompt::build_enrich_prompt(title, author, description),
            context: PromptContext::Enrich {
                title: title.to_string(),
                author: author.to_string(),
                description: description.map(String::from),
            },
        }
    }
}

/// A completed generation.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    /// Which provider actually produced the output.
    pub provider: String,
    pub model: String,
}

/// Gateway to the configured generation provider.
#[derive(Debug, Clone)]
pub struct Gateway {
    provider: Provider,
    config: AiConfig,
}

impl Gateway {
    /// Build a gateway from configuration. Never fails: credentials are
    /// checked at call time, where a missing key is just another live
    /// failure the fallback path absorbs. A misconfigured provider must
    /// not take the rest of the catalog down with it.
    pub fn new(config: &AiConfig) -> Self {
        Self {
            provider: Provider::from_name(&config.provider),
            config: config.clone(),
        }
    }

    /// Build a gateway with an explicit provider strategy, regardless of
    /// the configured provider name. Lets tests exercise the live-provider
    /// failure path deterministically.
    pub fn with_provider(provider: Provider, config: AiConfig) -> Self {
        Self { provider, config }
    }

    /// The configured provider.
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Dispatch a generation request to the configured provider.
    pub fn generate(&self, req: &GenerationRequest) -> AiResult<Generation> {
        match self.provider {
            Provider::Mock => Ok(self.generate_mock(req)),
            Provider::OpenAi => self.generate_openai(&req.prompt),
            Provider::Anthropic => self.generate_anthropic(&req.prompt),
        }
    }

    /// Generate, falling back to the mock on any live-provider failure.
    ///
    /// Never fails. Returns the generation and whether the fallback was
    /// taken. This is the only entry point the catalog uses.
    pub fn generate_or_fallback(&self, req: &GenerationRequest) -> (Generation, bool) {
        match self.generate(req) {
            Ok(generation) => (generation, false),
            Err(e) => {
                tracing::warn!(
                    provider = %self.provider,
                    error = %e,
                    "generation failed, falling back to mock"
                );
                (self.generate_mock(req), true)
            }
        }
    }

    fn generate_mock(&self, req: &GenerationRequest) -> Generation {
        let text = match &req.context {
            PromptContext::Search { query } => mock::smart_search(query),
            PromptContext::Enrich {
                title,
                author,
                description,
            } => mock::enrich_book(title, author, description.as_deref()),
        };
        Generation {
            text,
            provider: Provider::Mock.label().to_string(),
            model: "deterministic".to_string(),
        }
    }

    fn agent(&self) -> ureq::Agent {
        ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()
    }

    fn capped_prompt<'a>(&self, prompt: &'a str) -> &'a str {
        prompt::truncate_chars(prompt, self.config.max_prompt_chars)
    }

    fn generate_openai(&self, prompt: &str) -> AiResult<Generation> {
        const PROVIDER: &str = "openai";
        let api_key = openai_key()?;
        let url = format!("{}/v1/chat/completions", self.config.openai_base_url);

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": self.capped_prompt(prompt) }],
            "max_tokens": 512,
        });

        let resp = self
            .agent()
            .post(&url)
            .set("Content-Type", "application/json")
            .set("Authorization", &format!("Bearer {api_key}"))
            .send_string(&body.to_string())
            .map_err(|e| request_error(PROVIDER, e))?;

        let json = read_json(PROVIDER, resp)?;
        let text = json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        Ok(Generation {
            text,
            provider: PROVIDER.to_string(),
            model: self.config.model.clone(),
        })
    }

    fn generate_anthropic(&self, prompt: &str) -> AiResult<Generation> {
        const PROVIDER: &str = "anthropic";
        let api_key = anthropic_key()?;
        let url = format!("{}/v1/messages", self.config.anthropic_base_url);

        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": 512,
            "messages": [{ "role": "user", "content": self.capped_prompt(prompt) }],
        });

        let resp = self
            .agent()
            .post(&url)
            .set("Content-Type", "application/json")
            .set("x-api-key", &api_key)
            .set("anthropic-version", "2023-06-01")
            .send_string(&body.to_string())
            .map_err(|e| request_error(PROVIDER, e))?;

        let json = read_json(PROVIDER, resp)?;
        let text = json["content"][0]["text"].as_str().unwrap_or("").to_string();

        Ok(Generation {
            text,
            provider: PROVIDER.to_string(),
            model: self.config.model.clone(),
        })
    }
}

fn openai_key() -> AiResult<String> {
    std::env::var("OPENAI_API_KEY").map_err(|_| AiError::MissingApiKey {
        provider: "openai",
        env_var: "OPENAI_API_KEY",
    })
}

fn anthropic_key() -> AiResult<String> {
    std::env::var("ANTHROPIC_API_KEY").map_err(|_| AiError::MissingApiKey {
        provider: "anthropic",
        env_var: "ANTHROPIC_API_KEY",
    })
}

fn request_error(provider: &'static str, e: ureq::Error) -> AiError {
    match e {
        ureq::Error::Status(status, _) => AiError::BadStatus { provider, status },
        other => AiError::RequestFailed {
            provider,
            message: other.to_string(),
        },
    }
}

fn read_json(provider: &'static str, resp: ureq::Response) -> AiResult<serde_json::Value> {
    let body = resp.into_string().map_err(|e| AiError::ParseError {
        provider,
        message: e.to_string(),
    })?;
    serde_json::from_str(&body).map_err(|e| AiError::ParseError {
        provider,
        message: e.to_string(),
    })
}
