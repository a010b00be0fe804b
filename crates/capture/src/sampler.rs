use std::future::Future;

use trylens_core::Result;
use trylens_core::ids::TryId;
use trylens_store::TryRegistry;

use crate::context;

/// Recognized request marker. Absent means "do not sample".
pub const SAMPLE_HEADER: &str = "x-try-trace";

const ENABLE_TOKENS: [&str; 4] = ["on", "true", "1", "yes"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Unsampled,
    Sampled(TryId),
}

/// Pure decision step. An enable token (any casing) mints a fresh handle; a
/// well-formed 32-hex value adopts the caller-supplied handle; anything else
/// is an invalid-identifier error the caller surfaces as a 400.
pub fn decide(marker: Option<&str>) -> Result<Decision> {
    let Some(value) = marker else {
        return Ok(Decision::Unsampled);
    };

    let token = value.trim();
    if token.is_empty() || ENABLE_TOKENS.contains(&token.to_ascii_lowercase().as_str()) {
        return Ok(Decision::Sampled(TryId::generate()));
    }
    TryId::parse(token).map(Decision::Sampled)
}

/// Installs the sampling decision around a unit of work and registers the
/// pending record. No retries, no backoff: decision + installation only.
#[derive(Clone)]
pub struct Sampler {
    registry: TryRegistry,
}

impl Sampler {
    pub fn new(registry: TryRegistry) -> Self {
        Self { registry }
    }

    pub async fn sampled_scope<F: Future>(&self, decision: Decision, fut: F) -> F::Output {
        match decision {
            Decision::Sampled(id) => {
                self.registry.begin(&id);
                tracing::debug!(try_id = id.as_str(), "sampling unit of work");
                context::scope(id, fut).await
            }
            Decision::Unsampled => fut.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_marker_is_unsampled() {
        assert_eq!(decide(None).unwrap(), Decision::Unsampled);
    }

    #[test]
    fn enable_tokens_mint_fresh_handles() {
        for token in ["on", "ON", "true", "1", "yes", ""] {
            match decide(Some(token)).unwrap() {
                Decision::Sampled(id) => assert!(TryId::parse(id.as_str()).is_ok()),
                Decision::Unsampled => panic!("{token:?} should sample"),
            }
        }
    }

    #[test]
    fn well_formed_id_is_adopted() {
        let id = TryId::generate();
        assert_eq!(
            decide(Some(id.as_str())).unwrap(),
            Decision::Sampled(id)
        );
    }

    #[test]
    fn malformed_id_is_rejected() {
        assert!(decide(Some("definitely-not-an-id")).is_err());
        assert!(decide(Some("abcd")).is_err());
    }

    #[tokio::test]
    async fn sampled_scope_installs_context_and_registers() {
        let registry = TryRegistry::new();
        let sampler = Sampler::new(registry.clone());
        let id = TryId::generate();

        let seen = sampler
            .sampled_scope(Decision::Sampled(id.clone()), async {
                context::current()
            })
            .await;

        assert_eq!(seen, Some(id.clone()));
        assert!(registry.get(&id).is_some());
    }

    #[tokio::test]
    async fn unsampled_scope_installs_nothing() {
        let sampler = Sampler::new(TryRegistry::new());
        let seen = sampler
            .sampled_scope(Decision::Unsampled, async { context::current() })
            .await;
        assert_eq!(seen, None);
    }

    #[tokio::test]
    async fn concurrent_sampled_and_unsampled_work_do_not_interfere() {
        let sampler = Sampler::new(TryRegistry::new());
        let id = TryId::generate();

        let sampled = {
            let sampler = sampler.clone();
            let id = id.clone();
            tokio::spawn(async move {
                sampler
                    .sampled_scope(Decision::Sampled(id), async {
                        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                        context::current()
                    })
                    .await
            })
        };
        let unsampled = tokio::spawn(async move {
            sampler
                .sampled_scope(Decision::Unsampled, async {
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                    context::current()
                })
                .await
        });

        assert_eq!(sampled.await.unwrap(), Some(id));
        assert_eq!(unsampled.await.unwrap(), None);
    }
}
