use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use fnv::FnvHashMap;

use banphrase_client::BanphraseApiClient;
use persistence::channel::{BanphraseApiKind, ChannelDefinition, DowntimePolicy};

use crate::config::BotConfig;
use crate::state::banphrase_store::{BanphraseCheckResult, BanphraseStore};
use crate::Result;

/// External services only ever see a bounded prefix of the candidate reply.
const API_MESSAGE_LIMIT: usize = 1000;

/// Verdict of an external banphrase service.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiVerdict {
    pub banned: bool,
    pub phrase: Option<String>,
}

/// Seam over the external banphrase HTTP API, so the engine can be exercised
/// without network access.
#[async_trait]
pub trait ExternalBanphraseApi: Send + Sync {
    async fn test(&self, kind: BanphraseApiKind, url: &str, message: &str) -> Result<ApiVerdict>;
}

#[async_trait]
impl ExternalBanphraseApi for BanphraseApiClient {
    async fn test(&self, kind: BanphraseApiKind, url: &str, message: &str) -> Result<ApiVerdict> {
        match kind {
            BanphraseApiKind::Pajbot => {
                let verdict = BanphraseApiClient::test(self, url, message).await?;
                Ok(ApiVerdict {
                    banned: verdict.banned,
                    phrase: verdict.banphrase_data.and_then(|data| data.phrase),
                })
            }
        }
    }
}

/// Moderation cascade over outbound replies: the local banphrase fold,
/// followed by the channel's external banphrase API where one is configured.
///
/// The external call runs under a bounded timeout and retry budget; when the
/// budget is exhausted the channel's downtime policy decides what leaves the
/// system instead.
pub struct BanphraseEngine {
    api: Arc<dyn ExternalBanphraseApi>,
    timeout: Duration,
    retries: u32,
    downtime_notice: String,
    refusal: String,
    api_rejection: String,
    timeout_counts: Mutex<FnvHashMap<i64, u32>>,
}

impl BanphraseEngine {
    pub fn new(api: Arc<dyn ExternalBanphraseApi>, config: &BotConfig) -> Self {
        BanphraseEngine {
            api,
            timeout: Duration::from_millis(config.banphrase_api_timeout_ms()),
            retries: config.banphrase_api_retries(),
            downtime_notice: config.banphrase_downtime_notice().to_string(),
            refusal: config.banphrase_refusal().to_string(),
            api_rejection: config.banphrase_api_rejection().to_string(),
            timeout_counts: Mutex::new(FnvHashMap::default()),
        }
    }

    /// Consecutive external API failures recorded for a channel
    pub fn api_failures(&self, channel_id: i64) -> u32 {
        self.timeout_counts
            .lock()
            .unwrap()
            .get(&channel_id)
            .copied()
            .unwrap_or(0)
    }

    pub async fn execute(
        &self,
        store: &BanphraseStore,
        message: &str,
        channel: Option<&ChannelDefinition>,
    ) -> BanphraseCheckResult {
        let folded = store.fold(message, channel);
        if !folded.passed {
            return folded;
        }
        let message = match folded.string {
            Some(message) => message,
            None => return folded,
        };

        let channel = match channel {
            Some(channel) => channel,
            None => return BanphraseCheckResult::passed(message),
        };
        let (kind, url) = match channel.banphrase_api() {
            Some(api) => api,
            None => return BanphraseCheckResult::passed(message),
        };

        let capped: String = message.chars().take(API_MESSAGE_LIMIT).collect();

        for attempt in 0..=self.retries {
            match tokio::time::timeout(self.timeout, self.api.test(kind, url, &capped)).await {
                Ok(Ok(verdict)) => {
                    self.timeout_counts.lock().unwrap().remove(&channel.id);
                    if !verdict.banned {
                        return BanphraseCheckResult::passed(message);
                    }
                    debug!(
                        "external banphrase hit in {}: {:?}",
                        channel.name, verdict.phrase
                    );
                    return match store.api_response_for(&message, Some(channel)) {
                        Some(response) => BanphraseCheckResult::cut(response),
                        None => BanphraseCheckResult::cut(Some(self.api_rejection.clone())),
                    };
                }
                Ok(Err(err)) => {
                    warn!(
                        "banphrase API call {} for {} failed: {}",
                        attempt + 1,
                        channel.name,
                        err
                    );
                }
                Err(_) => {
                    warn!(
                        "banphrase API call {} for {} timed out after {:?}",
                        attempt + 1,
                        channel.name,
                        self.timeout
                    );
                }
            }
        }

        let failures = {
            let mut counts = self.timeout_counts.lock().unwrap();
            let entry = counts.entry(channel.id).or_insert(0);
            *entry += 1;
            *entry
        };
        warn!(
            "banphrase API for {} is down ({} consecutive failures), applying {:?} policy",
            channel.name, failures, channel.banphrase_api_downtime
        );

        match channel.banphrase_api_downtime {
            DowntimePolicy::Ignore => BanphraseCheckResult::passed(message),
            DowntimePolicy::Notify => {
                BanphraseCheckResult::passed(format!("{}{}", self.downtime_notice, message))
            }
            DowntimePolicy::Refuse => BanphraseCheckResult::cut(Some(self.refusal.clone())),
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::config::BotConfigBuilder;
    use persistence::banphrases::{BanphraseDefinition, BanphraseKind};
    use persistence::channel::ChannelMode;

    struct FixedVerdict(bool);

    #[async_trait]
    impl ExternalBanphraseApi for FixedVerdict {
        async fn test(
            &self,
            _kind: BanphraseApiKind,
            _url: &str,
            _message: &str,
        ) -> Result<ApiVerdict> {
            Ok(ApiVerdict {
                banned: self.0,
                phrase: None,
            })
        }
    }

    struct FailingApi {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ExternalBanphraseApi for FailingApi {
        async fn test(
            &self,
            _kind: BanphraseApiKind,
            _url: &str,
            _message: &str,
        ) -> Result<ApiVerdict> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(crate::error::Error::Config("unreachable".to_string()))
        }
    }

    struct HangingApi;

    #[async_trait]
    impl ExternalBanphraseApi for HangingApi {
        async fn test(
            &self,
            _kind: BanphraseApiKind,
            _url: &str,
            _message: &str,
        ) -> Result<ApiVerdict> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(ApiVerdict {
                banned: false,
                phrase: None,
            })
        }
    }

    fn engine(api: Arc<dyn ExternalBanphraseApi>, retries: u32) -> BanphraseEngine {
        let config = BotConfigBuilder::default()
            .command_prefix("$".to_string())
            .banphrase_api_timeout_ms(25)
            .banphrase_api_retries(retries)
            .build()
            .unwrap();
        BanphraseEngine::new(api, &config)
    }

    fn api_channel(downtime: DowntimePolicy) -> ChannelDefinition {
        ChannelDefinition {
            id: 7,
            name: "testchannel".to_string(),
            platform_id: 1,
            mode: ChannelMode::Write,
            mention: true,
            banphrase_api_type: Some(BanphraseApiKind::Pajbot),
            banphrase_api_url: Some("https://banphrases.example".to_string()),
            banphrase_api_downtime: downtime,
        }
    }

    #[tokio::test]
    async fn clean_api_verdict_passes_message() {
        let engine = engine(Arc::new(FixedVerdict(false)), 0);
        let store = BanphraseStore::load(vec![]);
        let result = engine
            .execute(&store, "hello", Some(&api_channel(DowntimePolicy::Refuse)))
            .await;
        assert_eq!(result, BanphraseCheckResult::passed("hello".to_string()));
        assert_eq!(engine.api_failures(7), 0);
    }

    #[tokio::test]
    async fn flagged_message_uses_api_response_rule() {
        let engine = engine(Arc::new(FixedVerdict(true)), 0);
        let store = BanphraseStore::load(vec![BanphraseDefinition {
            id: 1,
            kind: BanphraseKind::ApiResponse,
            pattern: ".*".to_string(),
            regex: true,
            case_sensitive: false,
            replacement: None,
            response: Some("A banned phrase was removed.".to_string()),
            platform_id: None,
            channel_id: None,
            priority: 0,
            active: true,
        }]);
        let result = engine
            .execute(&store, "whatever", Some(&api_channel(DowntimePolicy::Refuse)))
            .await;
        assert_eq!(
            result,
            BanphraseCheckResult::cut(Some("A banned phrase was removed.".to_string()))
        );
    }

    #[tokio::test]
    async fn flagged_message_falls_back_to_configured_rejection() {
        let engine = engine(Arc::new(FixedVerdict(true)), 0);
        let store = BanphraseStore::load(vec![]);
        let result = engine
            .execute(&store, "whatever", Some(&api_channel(DowntimePolicy::Refuse)))
            .await;
        assert!(!result.passed);
        assert!(result.string.is_some());
    }

    #[tokio::test]
    async fn downtime_refuse_returns_refusal_without_error() {
        let engine = engine(Arc::new(HangingApi), 0);
        let store = BanphraseStore::load(vec![]);
        let result = engine
            .execute(&store, "hello", Some(&api_channel(DowntimePolicy::Refuse)))
            .await;
        assert!(!result.passed);
        assert!(result.string.is_some());
        assert_eq!(engine.api_failures(7), 1);
    }

    #[tokio::test]
    async fn downtime_ignore_passes_message_through() {
        let engine = engine(Arc::new(HangingApi), 0);
        let store = BanphraseStore::load(vec![]);
        let result = engine
            .execute(&store, "hello", Some(&api_channel(DowntimePolicy::Ignore)))
            .await;
        assert_eq!(result, BanphraseCheckResult::passed("hello".to_string()));
    }

    #[tokio::test]
    async fn downtime_notify_prefixes_warning() {
        let engine = engine(Arc::new(HangingApi), 0);
        let store = BanphraseStore::load(vec![]);
        let result = engine
            .execute(&store, "hello", Some(&api_channel(DowntimePolicy::Notify)))
            .await;
        assert!(result.passed);
        let reply = result.string.unwrap();
        assert!(reply.ends_with("hello"));
        assert!(reply.len() > "hello".len());
    }

    #[tokio::test]
    async fn failed_calls_are_retried_within_budget() {
        let api = Arc::new(FailingApi {
            calls: AtomicU32::new(0),
        });
        let engine = engine(api.clone(), 2);
        let store = BanphraseStore::load(vec![]);
        let _ = engine
            .execute(&store, "hello", Some(&api_channel(DowntimePolicy::Ignore)))
            .await;
        assert_eq!(api.calls.load(Ordering::SeqCst), 3);
        assert_eq!(engine.api_failures(7), 1);
    }

    #[tokio::test]
    async fn local_denial_short_circuits_before_api() {
        let api = Arc::new(FailingApi {
            calls: AtomicU32::new(0),
        });
        let engine = engine(api.clone(), 0);
        let store = BanphraseStore::load(vec![BanphraseDefinition {
            id: 1,
            kind: BanphraseKind::Denial,
            pattern: "forbidden".to_string(),
            regex: false,
            case_sensitive: false,
            replacement: None,
            response: None,
            platform_id: None,
            channel_id: None,
            priority: 0,
            active: true,
        }]);
        let result = engine
            .execute(&store, "forbidden text", Some(&api_channel(DowntimePolicy::Refuse)))
            .await;
        assert_eq!(result, BanphraseCheckResult::cut(None));
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn channels_without_api_skip_the_external_step() {
        let api = Arc::new(FailingApi {
            calls: AtomicU32::new(0),
        });
        let engine = engine(api.clone(), 0);
        let store = BanphraseStore::load(vec![]);
        let mut channel = api_channel(DowntimePolicy::Refuse);
        channel.banphrase_api_type = None;
        let result = engine.execute(&store, "hello", Some(&channel)).await;
        assert!(result.passed);
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }
}
