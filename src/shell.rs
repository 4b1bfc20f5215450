use chrono::Utc;
use log::{ info, warn };
use std::future::Future;
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::Arc;
use tokio::sync::{ broadcast, RwLock };

use crate::cli::Args;
use crate::config::prompt;
use crate::error::{ Activity, BoxError, ShellError };
use crate::llm::{ new_client, LlmConfig };
use crate::models::{ Author, ChatExchange, ChatMessage, ImageRef, MediaType, Status, TimelineEntry };
use crate::services::{ ChatService, DescriptionService };
use crate::store::{ SessionEvent, SessionStore };

pub const FALLBACK_REPLY: &str = "Sorry, I couldn't process that. Please try again.";
pub const DESCRIPTION_FAILED_NOTICE: &str =
    "Failed to get AI description. Please check the logs for more details.";
pub const READ_FAILED_NOTICE: &str = "Failed to read the image file.";
pub const CHAT_FAILED_NOTICE: &str = "Failed to get chatbot response.";

struct Inner {
    describer: DescriptionService,
    chat: ChatService,
    store: Arc<SessionStore>,
    notice: RwLock<Option<String>>,
    uploading: AtomicBool,
    replying: AtomicBool,
}

/// Entry point for user gestures: uploads, chat messages and notice dismissal.
/// Cloning is cheap; clones share the same session.
#[derive(Clone)]
pub struct Shell {
    inner: Arc<Inner>,
}

/// Lowers the loading flag of one interaction class when dropped.
struct ActivityGuard<'a> {
    shell: &'a Shell,
    activity: Activity,
}

impl Drop for ActivityGuard<'_> {
    fn drop(&mut self) {
        self.shell.flag(self.activity).store(false, Ordering::SeqCst);
        self.shell.inner.store.publish(SessionEvent::Status(self.shell.status()));
    }
}

impl Shell {
    pub fn new(
        describer: DescriptionService,
        chat: ChatService,
        store: Arc<SessionStore>
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                describer,
                chat,
                store,
                notice: RwLock::new(None),
                uploading: AtomicBool::new(false),
                replying: AtomicBool::new(false),
            }),
        }
    }

    pub fn from_args(args: &Args) -> Result<Self, BoxError> {
        let llm_config = LlmConfig {
            api_key: Some(args.api_key.clone()).filter(|k| !k.trim().is_empty()),
            model: Some(args.model.clone()),
            base_url: Some(args.base_url.clone()),
        };
        let client = new_client(&llm_config)?;
        info!("Generation client configured: Model={}, BaseURL={}", client.get_model(), args.base_url);

        let prompts = prompt::resolve_prompts(args.prompts_path.as_deref())?;
        let describer = DescriptionService::new(client.clone(), prompts.clone());
        let chat = ChatService::new(client, prompts).with_temperature(args.chat_temperature);

        Ok(Self::new(describer, chat, SessionStore::new()))
    }

    fn flag(&self, activity: Activity) -> &AtomicBool {
        match activity {
            Activity::Upload => &self.inner.uploading,
            Activity::Chat => &self.inner.replying,
        }
    }

    fn begin(&self, activity: Activity) -> Result<ActivityGuard<'_>, ShellError> {
        if
            self
                .flag(activity)
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
        {
            warn!("Refusing concurrent {}", activity);
            return Err(ShellError::Busy(activity));
        }
        self.inner.store.publish(SessionEvent::Status(self.status()));
        Ok(ActivityGuard { shell: self, activity })
    }

    pub fn status(&self) -> Status {
        Status {
            uploading: self.inner.uploading.load(Ordering::SeqCst),
            replying: self.inner.replying.load(Ordering::SeqCst),
        }
    }

    pub async fn notice(&self) -> Option<String> {
        self.inner.notice.read().await.clone()
    }

    async fn set_notice(&self, notice: Option<&str>) {
        let notice = notice.map(str::to_string);
        let mut current = self.inner.notice.write().await;
        if *current == notice {
            return;
        }
        *current = notice.clone();
        drop(current);
        self.inner.store.publish(SessionEvent::Notice(notice));
    }

    pub async fn dismiss_notice(&self) {
        self.set_notice(None).await;
    }

    pub async fn upload_image(
        &self,
        bytes: Vec<u8>,
        content_type: &str
    ) -> Result<TimelineEntry, ShellError> {
        self.upload_image_from(async move { Ok::<_, std::convert::Infallible>(bytes) }, content_type).await
    }

    /// Describes the image produced by `read` and appends it to the timeline.
    /// The capture time is taken before the read starts.
    pub async fn upload_image_from<F, B, E>(
        &self,
        read: F,
        content_type: &str
    ) -> Result<TimelineEntry, ShellError>
        where F: Future<Output = Result<B, E>>, B: Into<Vec<u8>>, E: Into<BoxError>
    {
        let _guard = self.begin(Activity::Upload)?;
        self.set_notice(None).await;

        let media_type = match content_type.parse::<MediaType>() {
            Ok(m) => m,
            Err(e) => {
                warn!("{}", e);
                self.set_notice(Some(&format!("Unsupported image type: {}", e.value()))).await;
                return Err(ShellError::UnsupportedMediaType(e.value().to_string()));
            }
        };
        let captured_at = Utc::now();

        let bytes: Vec<u8> = match read.await {
            Ok(b) => b.into(),
            Err(e) => {
                let e = e.into();
                warn!("Image read error: {}", e);
                self.set_notice(Some(READ_FAILED_NOTICE)).await;
                return Err(ShellError::FileRead(e));
            }
        };

        let description = match self.inner.describer.describe_image(&bytes, media_type).await {
            Ok(d) => d,
            Err(e) => {
                self.set_notice(Some(DESCRIPTION_FAILED_NOTICE)).await;
                return Err(e.into());
            }
        };

        let entry = self.inner.store.append_entry(
            captured_at,
            media_type,
            Arc::from(bytes),
            description
        ).await;
        info!("Timeline entry {} added ({})", entry.id, media_type);
        Ok(entry)
    }

    /// Records the user's message and the reply to it. Blank input is ignored.
    /// A chat-service failure still yields an exchange, with the fallback reply.
    pub async fn send_message(&self, text: &str) -> Result<Option<ChatExchange>, ShellError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let _guard = self.begin(Activity::Chat)?;
        self.set_notice(None).await;

        let store = &self.inner.store;
        let timeline = store.timeline().all().await;
        let history = store.chat().all().await;
        let user = store.append_message(Author::User, text.to_string()).await;

        let (reply_text, fallback) = match self.inner.chat.reply(text, &timeline, &history).await {
            Ok(r) => (r, false),
            Err(e) => {
                warn!("Substituting fallback reply: {}", e);
                (FALLBACK_REPLY.to_string(), true)
            }
        };
        let reply = store.append_message(Author::Assistant, reply_text).await;
        if fallback {
            self.set_notice(Some(CHAT_FAILED_NOTICE)).await;
        }

        Ok(Some(ChatExchange { user, reply, fallback }))
    }

    /// Timeline newest first.
    pub async fn feed(&self) -> Vec<TimelineEntry> {
        self.inner.store.timeline().feed().await
    }

    pub async fn timeline(&self) -> Vec<TimelineEntry> {
        self.inner.store.timeline().all().await
    }

    pub async fn chat_history(&self) -> Vec<ChatMessage> {
        self.inner.store.chat().all().await
    }

    pub async fn image(&self, id: u64) -> Option<ImageRef> {
        self.inner.store.timeline().image(id).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.store.subscribe()
    }
}
