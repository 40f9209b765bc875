use faceprint_core::{BoundingBox, DecodeError, Embedding, FaceAnalyzer};
use std::thread::JoinHandle;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Requests that may wait for the engine thread at once.
const QUEUE_DEPTH: usize = 16;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("image decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("analysis error: {0}")]
    Analysis(#[from] faceprint_core::AnalysisError),
    #[error("no face detected")]
    NoFaceDetected,
    #[error("selected face has no embedding")]
    MissingEmbedding,
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Result of an enrollment operation.
#[derive(Debug)]
pub struct EnrollResult {
    pub embedding: Embedding,
    pub face: BoundingBox,
    pub faces_detected: usize,
}

/// Messages sent from HTTP handlers to the engine thread.
enum EngineRequest {
    Enroll {
        image: Vec<u8>,
        reply: oneshot::Sender<Result<EnrollResult, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Decode the image, detect faces, return the largest face's embedding.
    pub async fn enroll(&self, image: Vec<u8>) -> Result<EnrollResult, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Enroll {
                image,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Owner of the engine thread. Dropping every [`EngineHandle`] and calling
/// [`Engine::shutdown`] stops the thread and releases the model.
pub struct Engine {
    handle: EngineHandle,
    thread: JoinHandle<()>,
}

impl Engine {
    /// Move an already-loaded analyzer onto a dedicated OS thread and start
    /// serving requests.
    pub fn spawn<A>(mut analyzer: A) -> Result<Self, EngineError>
    where
        A: FaceAnalyzer + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<EngineRequest>(QUEUE_DEPTH);

        let thread = std::thread::Builder::new()
            .name("faceprint-engine".into())
            .spawn(move || {
                tracing::info!(model = analyzer.model_name(), "engine thread started");
                while let Some(req) = rx.blocking_recv() {
                    match req {
                        EngineRequest::Enroll { image, reply } => {
                            let result = run_enroll(&mut analyzer, &image);
                            let _ = reply.send(result);
                        }
                    }
                }
                tracing::info!("engine thread exiting");
            })?;

        Ok(Self {
            handle: EngineHandle { tx },
            thread,
        })
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Close this owner's channel and wait for the thread to finish.
    ///
    /// Blocks until every other handle has been dropped.
    pub fn shutdown(self) {
        drop(self.handle);
        if self.thread.join().is_err() {
            tracing::error!("engine thread panicked");
        }
    }
}

fn run_enroll(analyzer: &mut impl FaceAnalyzer, image: &[u8]) -> Result<EnrollResult, EngineError> {
    let rgb = faceprint_core::decode_rgb(image)?;
    tracing::debug!(width = rgb.width(), height = rgb.height(), "enroll: image decoded");

    let faces = analyzer.analyze(&rgb)?;
    if faces.is_empty() {
        return Err(EngineError::NoFaceDetected);
    }

    let face = faceprint_core::largest_face(&faces).map_err(|_| EngineError::NoFaceDetected)?;
    let embedding = face.embedding.clone().ok_or(EngineError::MissingEmbedding)?;

    tracing::debug!(
        faces = faces.len(),
        area = face.bbox.area(),
        confidence = face.bbox.confidence,
        "enroll: largest face selected"
    );

    Ok(EnrollResult {
        embedding,
        face: face.bbox.clone(),
        faces_detected: faces.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{bare_face, face, png_bytes, StubAnalyzer};

    #[tokio::test]
    async fn test_enroll_selects_largest_face() {
        let analyzer = StubAnalyzer::new(vec![
            face(10.0, 1.0, 0.1),
            face(50.0, 1.0, 0.2),
            face(30.0, 1.0, 0.3),
        ]);
        let engine = Engine::spawn(analyzer).unwrap();

        let result = engine.handle().enroll(png_bytes()).await.unwrap();
        assert_eq!(result.faces_detected, 3);
        assert_eq!(result.face.area(), 50.0);
        assert_eq!(result.embedding.values[0], 0.2);

        engine.shutdown();
    }

    #[tokio::test]
    async fn test_enroll_no_face() {
        let engine = Engine::spawn(StubAnalyzer::new(vec![])).unwrap();
        let err = engine.handle().enroll(png_bytes()).await.unwrap_err();
        assert!(matches!(err, EngineError::NoFaceDetected));
        engine.shutdown();
    }

    #[tokio::test]
    async fn test_enroll_undecodable_image() {
        let engine = Engine::spawn(StubAnalyzer::new(vec![face(1.0, 1.0, 0.5)])).unwrap();
        let err = engine.handle().enroll(b"GIF89a not really".to_vec()).await.unwrap_err();
        assert!(matches!(err, EngineError::Decode(_)));
        engine.shutdown();
    }

    #[tokio::test]
    async fn test_analysis_failure_keeps_engine_running() {
        let engine = Engine::spawn(StubAnalyzer::failing(1, vec![face(4.0, 4.0, 0.6)])).unwrap();
        let handle = engine.handle();

        let err = handle.enroll(png_bytes()).await.unwrap_err();
        assert!(matches!(err, EngineError::Analysis(_)), "{err:?}");

        let result = handle.enroll(png_bytes()).await.unwrap();
        assert_eq!(result.embedding.values[0], 0.6);

        drop(handle);
        engine.shutdown();
    }

    #[tokio::test]
    async fn test_largest_face_without_embedding() {
        let engine = Engine::spawn(StubAnalyzer::new(vec![face(1.0, 1.0, 0.5), bare_face(9.0, 9.0)])).unwrap();
        let err = engine.handle().enroll(png_bytes()).await.unwrap_err();
        assert!(matches!(err, EngineError::MissingEmbedding));
        engine.shutdown();
    }

    #[tokio::test]
    async fn test_crashed_engine_reports_channel_closed() {
        let engine = Engine::spawn(StubAnalyzer::panicking()).unwrap();
        let handle = engine.handle();

        let first = handle.enroll(png_bytes()).await.unwrap_err();
        assert!(matches!(first, EngineError::ChannelClosed));
        let second = handle.enroll(png_bytes()).await.unwrap_err();
        assert!(matches!(second, EngineError::ChannelClosed));
    }

    #[test]
    fn test_shutdown_joins_after_handles_dropped() {
        let engine = Engine::spawn(StubAnalyzer::new(vec![])).unwrap();
        let handle = engine.handle();
        drop(handle);
        engine.shutdown();
    }
}
