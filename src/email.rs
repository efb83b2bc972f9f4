use async_trait::async_trait;
use tracing::info;

/// Outbound notification collaborator. Only the OTP request path sends
/// mail; everything else in the core is transport-free.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Transport stub that writes the message to the log instead of SMTP.
/// Real delivery is wired in by deployment, same seam either way.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> anyhow::Result<()> {
        info!(to = %to, subject = %subject, "email send (log transport)");
        Ok(())
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: std::sync::Mutex<Vec<(String, String, String)>>,
}

#[cfg(test)]
#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to.into(), subject.into(), body.into()));
        Ok(())
    }
}

#[cfg(test)]
pub struct FailingMailer;

#[cfg(test)]
#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _to: &str, _subject: &str, _body: &str) -> anyhow::Result<()> {
        anyhow::bail!("smtp connection refused")
    }
}
