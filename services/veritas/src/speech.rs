use anyhow::{Context, Result};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Whatever turns assistant text into sound in the room.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    async fn speak(&self, text: &str) -> Result<()>;
}

/// Prints utterances as `Veritas: <text>` lines, standing in for a TTS device.
pub struct ConsoleSpeech<W> {
    out: Mutex<W>,
}

impl ConsoleSpeech<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> ConsoleSpeech<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

#[async_trait]
impl<W> SpeechOutput for ConsoleSpeech<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn speak(&self, text: &str) -> Result<()> {
        let mut out = self.out.lock().await;
        out.write_all(format!("Veritas: {text}\n").as_bytes())
            .await
            .context("Failed to write speech output")?;
        out.flush().await.context("Failed to flush speech output")?;
        Ok(())
    }
}

/// Speaks `text`, logging instead of propagating a failure.
///
/// Returns whether the text was delivered.
pub async fn deliver(output: &dyn SpeechOutput, text: &str) -> bool {
    match output.speak(text).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("Speech output failed: {:#}", e);
            false
        }
    }
}
