//! Speech capture, behind a narrow capability trait.
//!
//! Hosts that have a recognizer bridge it in through `SpeechCapture`;
//! platforms without one install `NoSpeechCapture` and the voice affordance
//! simply does not exist. Consumers are polymorphic over the capability and
//! never branch on platform detection.

use anyhow::{Result, bail};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::warn;

/// Events emitted during a listening span.
#[derive(Debug, Clone)]
pub enum SpeechEvent {
    /// The full transcript accumulated so far for the current span. Each
    /// delivery supersedes the previous one; consumers replace, never
    /// append.
    Transcript(String),
    /// A recognition error. The span is over; the user can retry.
    Error(String),
}

/// An external speech-to-text facility.
///
/// `start` opens a fresh listening span and hands back its event channel.
/// Dropping that receiver (which `stop` implies on the consuming side) ends
/// the span; a span can never deliver events after it is over.
pub trait SpeechCapture: Send + Sync {
    fn is_available(&self) -> bool;
    fn start(&self) -> Result<mpsc::Receiver<SpeechEvent>>;
    fn stop(&self);
}

/// The adapter for platforms without any recognition facility.
pub struct NoSpeechCapture;

impl SpeechCapture for NoSpeechCapture {
    fn is_available(&self) -> bool {
        false
    }

    fn start(&self) -> Result<mpsc::Receiver<SpeechEvent>> {
        bail!("Speech capture is not supported on this platform")
    }

    fn stop(&self) {}
}

/// A push-driven capture used by tests and by hosts that feed transcripts
/// in from an external recognizer.
pub struct ScriptedSpeechCapture {
    tx: Mutex<Option<mpsc::Sender<SpeechEvent>>>,
}

impl ScriptedSpeechCapture {
    pub fn new() -> Self {
        Self {
            tx: Mutex::new(None),
        }
    }

    /// Delivers the transcript-so-far into the current span. Returns false
    /// when no span is listening.
    pub fn push(&self, transcript: &str) -> bool {
        self.send(SpeechEvent::Transcript(transcript.to_string()))
    }

    /// Delivers a recognition error into the current span.
    pub fn fail(&self, message: &str) -> bool {
        self.send(SpeechEvent::Error(message.to_string()))
    }

    fn send(&self, event: SpeechEvent) -> bool {
        let guard = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            Some(tx) => tx.try_send(event).is_ok(),
            None => false,
        }
    }
}

impl Default for ScriptedSpeechCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechCapture for ScriptedSpeechCapture {
    fn is_available(&self) -> bool {
        true
    }

    fn start(&self) -> Result<mpsc::Receiver<SpeechEvent>> {
        let (tx, rx) = mpsc::channel(32);
        let mut guard = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(tx);
        Ok(rx)
    }

    fn stop(&self) {
        let mut guard = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        guard.take();
    }
}

/// Push-to-talk state machine over a `SpeechCapture`.
///
/// `Inactive -> Listening -> Inactive`, toggled manually; there is no
/// auto-stop on silence. The evolving transcript replaces prior deliveries
/// for the same span.
pub struct SpeechController {
    capture: Arc<dyn SpeechCapture>,
    rx: Option<mpsc::Receiver<SpeechEvent>>,
    transcript: String,
}

impl SpeechController {
    pub fn new(capture: Arc<dyn SpeechCapture>) -> Self {
        Self {
            capture,
            rx: None,
            transcript: String::new(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.capture.is_available()
    }

    pub fn is_listening(&self) -> bool {
        self.rx.is_some()
    }

    /// Flips between listening and inactive. Returns the new listening
    /// state. When the facility is absent this is a no-op, not an error.
    pub fn toggle(&mut self) -> bool {
        if self.rx.take().is_some() {
            self.capture.stop();
            return false;
        }
        if !self.capture.is_available() {
            return false;
        }
        match self.capture.start() {
            Ok(rx) => {
                self.transcript.clear();
                self.rx = Some(rx);
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to start speech capture");
                false
            }
        }
    }

    /// Awaits the next transcript update for the current span. Resolves
    /// `None` when the span ends: recognition error, channel closed, or
    /// not listening at all. Errors stop listening and are logged, never
    /// escalated.
    pub async fn next_update(&mut self) -> Option<String> {
        let rx = self.rx.as_mut()?;
        match rx.recv().await {
            Some(SpeechEvent::Transcript(text)) => {
                self.transcript = text.clone();
                Some(text)
            }
            Some(SpeechEvent::Error(message)) => {
                warn!(error = %message, "Speech recognition error; listening stopped");
                self.capture.stop();
                self.rx = None;
                None
            }
            None => {
                self.rx = None;
                None
            }
        }
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Takes the final utterance accumulated in the last span.
    pub fn take_transcript(&mut self) -> String {
        std::mem::take(&mut self.transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_capture_offers_no_listening() {
        let mut controller = SpeechController::new(Arc::new(NoSpeechCapture));
        assert!(!controller.is_available());
        assert!(!controller.toggle());
        assert!(!controller.is_listening());
        assert!(controller.next_update().await.is_none());
    }

    #[tokio::test]
    async fn test_transcript_deliveries_replace_not_append() {
        let capture = Arc::new(ScriptedSpeechCapture::new());
        let mut controller = SpeechController::new(capture.clone());

        assert!(controller.toggle());
        assert!(capture.push("hello"));
        assert_eq!(controller.next_update().await.as_deref(), Some("hello"));

        assert!(capture.push("hello world"));
        assert_eq!(controller.next_update().await.as_deref(), Some("hello world"));
        assert_eq!(controller.transcript(), "hello world");
    }

    #[tokio::test]
    async fn test_double_toggle_returns_to_inactive_with_no_residual_events() {
        let capture = Arc::new(ScriptedSpeechCapture::new());
        let mut controller = SpeechController::new(capture.clone());

        assert!(controller.toggle());
        assert!(capture.push("final words"));
        assert_eq!(controller.next_update().await.as_deref(), Some("final words"));

        assert!(!controller.toggle());
        assert!(!controller.is_listening());
        // The span is over: nothing can be delivered into it any more.
        assert!(!capture.push("trailing"));
        assert!(controller.next_update().await.is_none());
        assert_eq!(controller.take_transcript(), "final words");
        assert_eq!(controller.transcript(), "");
    }

    #[tokio::test]
    async fn test_recognition_error_stops_listening_without_escalating() {
        let capture = Arc::new(ScriptedSpeechCapture::new());
        let mut controller = SpeechController::new(capture.clone());

        assert!(controller.toggle());
        assert!(capture.fail("no-speech"));
        assert!(controller.next_update().await.is_none());
        assert!(!controller.is_listening());

        // The user can simply retry.
        assert!(controller.toggle());
        assert!(capture.push("second try"));
        assert_eq!(controller.next_update().await.as_deref(), Some("second try"));
    }

    #[tokio::test]
    async fn test_new_span_starts_with_a_clean_transcript() {
        let capture = Arc::new(ScriptedSpeechCapture::new());
        let mut controller = SpeechController::new(capture.clone());

        assert!(controller.toggle());
        assert!(capture.push("first span"));
        controller.next_update().await;
        assert!(!controller.toggle());

        assert!(controller.toggle());
        assert_eq!(controller.transcript(), "");
    }
}
