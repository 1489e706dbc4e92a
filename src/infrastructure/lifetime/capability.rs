//! 生命周期能力接口

use async_trait::async_trait;

/// Progress shown while a lifecycle pass runs. The container forwards it to
/// every participant without looking at it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    title: String,
    subtitle: String,
    percent: i32,
}

impl Progress {
    /// The percent is clamped with `min(percent, -1)`, so anything above -1 is
    /// reported as -1 (indeterminate).
    pub fn new(title: impl Into<String>, subtitle: impl Into<String>, percent: i32) -> Self {
        Self {
            title: title.into(),
            subtitle: subtitle.into(),
            percent: percent.min(-1),
        }
    }

    pub fn indeterminate(title: impl Into<String>, subtitle: impl Into<String>) -> Self {
        Self::new(title, subtitle, -1)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn subtitle(&self) -> &str {
        &self.subtitle
    }

    /// In `[-1, 100]`; -1 means indeterminate.
    pub fn percent(&self) -> i32 {
        self.percent
    }
}

/// Components started when the client starts and stopped when it shuts down.
#[async_trait]
pub trait ClientLifetime: Send + Sync {
    async fn run_startup(&self, progress: &Progress) -> anyhow::Result<()>;

    async fn run_shutdown(&self, progress: &Progress) -> anyhow::Result<()>;
}

/// Components notified when a user logs on and off.
#[async_trait]
pub trait LogonLifetime: Send + Sync {
    async fn run_logon(&self, progress: &Progress) -> anyhow::Result<()>;

    async fn run_logoff(&self, progress: &Progress) -> anyhow::Result<()>;
}
