use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    client::DynPredictor,
    entities::{Field, Prediction, RideRequest},
    error::Error,
};

pub const ALERT_MESSAGE: &str = "Error making prediction! Check console for details.";

/// Surfaces failures to the person filling in the form.
pub trait Notifier {
    fn alert(&self, message: &str);
}

pub type DynNotifier = Arc<dyn Notifier + Send + Sync>;

#[derive(Clone, Debug, PartialEq)]
pub enum Status {
    Idle,
    AwaitingResponse { seq: u64 },
    DisplayingResult,
    DisplayingError { diagnostic: String },
}

impl Status {
    pub fn name(&self) -> String {
        match self {
            Self::Idle => "idle".into(),
            Self::AwaitingResponse { seq: _ } => "awaiting_response".into(),
            Self::DisplayingResult => "displaying_result".into(),
            Self::DisplayingError { diagnostic: _ } => "displaying_error".into(),
        }
    }
}

/// A captured payload, tagged with the sequence number it was issued under.
#[derive(Clone, Debug, PartialEq)]
pub struct Submission {
    pub seq: u64,
    pub payload: RideRequest,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FormState {
    pub request: RideRequest,
    pub status: Status,
    pub prediction: Option<Prediction>,
    latest_seq: u64,
}

impl Default for FormState {
    fn default() -> Self {
        Self::new()
    }
}

impl FormState {
    pub fn new() -> Self {
        Self {
            request: RideRequest::default(),
            status: Status::Idle,
            prediction: None,
            latest_seq: 0,
        }
    }

    pub fn latest_seq(&self) -> u64 {
        self.latest_seq
    }

    pub fn update_field(&self, field: Field, raw: &str) -> Result<Self, Error> {
        Ok(Self {
            request: self.request.with_field(field, raw)?,
            ..self.clone()
        })
    }

    pub fn begin_submit(&self) -> (Self, Submission) {
        let seq = self.latest_seq + 1;

        let next = Self {
            status: Status::AwaitingResponse { seq },
            latest_seq: seq,
            ..self.clone()
        };

        let submission = Submission {
            seq,
            payload: self.request.clone(),
        };

        (next, submission)
    }

    /// Applies the outcome of submission `seq`. Returns `None` when a newer
    /// submission has been issued since, leaving the state as it is.
    pub fn resolve(&self, seq: u64, outcome: &Result<Prediction, Error>) -> Option<Self> {
        if seq != self.latest_seq {
            return None;
        }

        let next = match outcome {
            Ok(prediction) => Self {
                status: Status::DisplayingResult,
                prediction: Some(*prediction),
                ..self.clone()
            },
            Err(err) => Self {
                status: Status::DisplayingError {
                    diagnostic: err.diagnostic().to_string(),
                },
                prediction: None,
                ..self.clone()
            },
        };

        Some(next)
    }
}

pub struct FormClient {
    predictor: DynPredictor,
    notifier: DynNotifier,
    state: Mutex<FormState>,
}

impl FormClient {
    pub fn new(predictor: DynPredictor, notifier: DynNotifier) -> Self {
        Self {
            predictor,
            notifier,
            state: Mutex::new(FormState::new()),
        }
    }

    pub async fn state(&self) -> FormState {
        self.state.lock().await.clone()
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_field(&self, field: Field, raw: &str) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        *state = state.update_field(field, raw)?;

        Ok(())
    }

    /// Sends the current request and records the outcome if it is still the
    /// latest submission. Failures are logged and alerted here; the result is
    /// returned so callers can render it.
    #[tracing::instrument(skip(self))]
    pub async fn submit(&self) -> Result<Prediction, Error> {
        let submission = {
            let mut state = self.state.lock().await;
            let (next, submission) = state.begin_submit();
            *state = next;
            submission
        };

        // the lock is not held across the call
        let outcome = self.predictor.predict(&submission.payload).await;

        if let Err(err) = &outcome {
            tracing::error!(seq = submission.seq, code = err.code, "{}", err.diagnostic());
        }

        let applied = {
            let mut state = self.state.lock().await;
            match state.resolve(submission.seq, &outcome) {
                Some(next) => {
                    *state = next;
                    true
                }
                None => false,
            }
        };

        if !applied {
            tracing::debug!(seq = submission.seq, "discarding stale prediction response");
            return outcome;
        }

        match &outcome {
            Ok(prediction) => tracing::info!(seq = submission.seq, "predicted {}", prediction),
            Err(_) => self.notifier.alert(ALERT_MESSAGE),
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Predictor;
    use crate::entities::{BatchPrediction, Health};
    use crate::error::{invalid_input_error, upstream_status_error};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use tokio::sync::oneshot;

    #[derive(Default)]
    struct RecordingNotifier {
        alerts: std::sync::Mutex<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn alert(&self, message: &str) {
            self.alerts.lock().unwrap().push(message.to_string());
        }
    }

    /// Each `predict` call waits on the next queued gate.
    #[derive(Default)]
    struct GatedPredictor {
        gates: std::sync::Mutex<VecDeque<oneshot::Receiver<Result<Prediction, Error>>>>,
        payloads: std::sync::Mutex<Vec<RideRequest>>,
    }

    impl GatedPredictor {
        fn gate(&self) -> oneshot::Sender<Result<Prediction, Error>> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().push_back(rx);
            tx
        }
    }

    #[async_trait]
    impl Predictor for GatedPredictor {
        async fn predict(&self, request: &RideRequest) -> Result<Prediction, Error> {
            self.payloads.lock().unwrap().push(request.clone());
            let rx = self.gates.lock().unwrap().pop_front().unwrap();
            rx.await.unwrap()
        }

        async fn health(&self) -> Result<Health, Error> {
            Err(invalid_input_error())
        }

        async fn predict_batch(&self, _: &str, _: Vec<u8>) -> Result<Vec<BatchPrediction>, Error> {
            Err(invalid_input_error())
        }
    }

    /// Collects formatted log lines written by a scoped subscriber.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn client() -> (FormClient, Arc<GatedPredictor>, Arc<RecordingNotifier>) {
        let predictor = Arc::new(GatedPredictor::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let client = FormClient::new(predictor.clone(), notifier.clone());
        (client, predictor, notifier)
    }

    #[test]
    fn initial_state_is_idle() {
        let state = FormState::new();

        assert_eq!(state.status, Status::Idle);
        assert_eq!(state.prediction, None);
        assert_eq!(state.request, RideRequest::default());
        assert_eq!(state.latest_seq(), 0);
    }

    #[test]
    fn submit_captures_payload_at_submission_time() {
        let state = FormState::new()
            .update_field(Field::NumberOfRiders, "10")
            .unwrap();

        let (state, submission) = state.begin_submit();
        let state = state.update_field(Field::NumberOfRiders, "99").unwrap();

        assert_eq!(submission.seq, 1);
        assert_eq!(submission.payload.number_of_riders, 10);
        assert_eq!(state.request.number_of_riders, 99);
        assert_eq!(state.status, Status::AwaitingResponse { seq: 1 });
    }

    #[test]
    fn rejected_update_keeps_previous_state() {
        let state = FormState::new()
            .update_field(Field::AverageRatings, "4.5")
            .unwrap();

        assert!(state.update_field(Field::AverageRatings, "").is_err());
        assert_eq!(state.request.average_ratings, 4.5);
    }

    #[test]
    fn transitions_through_result_and_error() {
        let (state, first) = FormState::new().begin_submit();
        let state = state
            .resolve(first.seq, &Ok(Prediction::new(123.456)))
            .unwrap();

        assert_eq!(state.status, Status::DisplayingResult);
        assert_eq!(state.prediction.unwrap().to_string(), "₹123.46");

        let (state, second) = state.begin_submit();
        assert_eq!(state.status.name(), "awaiting_response");

        let err = upstream_status_error(500).with_detail("model unavailable");
        let state = state.resolve(second.seq, &Err(err)).unwrap();

        assert_eq!(
            state.status,
            Status::DisplayingError {
                diagnostic: "model unavailable".into()
            }
        );
        assert_eq!(state.prediction, None);

        let (state, third) = state.begin_submit();
        assert_eq!(third.seq, 3);
        assert_eq!(state.status, Status::AwaitingResponse { seq: 3 });
    }

    #[test]
    fn stale_responses_are_discarded() {
        let (state, first) = FormState::new().begin_submit();
        let (state, second) = state.begin_submit();

        let state = state
            .resolve(second.seq, &Ok(Prediction::new(20.0)))
            .unwrap();

        assert!(state
            .resolve(first.seq, &Ok(Prediction::new(10.0)))
            .is_none());
        assert!(state
            .resolve(first.seq, &Err(upstream_status_error(502)))
            .is_none());
        assert_eq!(state.prediction, Some(Prediction::new(20.0)));
    }

    #[test]
    fn client_applies_success() {
        use tokio_test::block_on;

        let (client, predictor, notifier) = client();
        let gate = predictor.gate();
        gate.send(Ok(Prediction::new(88.8))).unwrap();

        block_on(client.update_field(Field::VehicleType, "Premium")).unwrap();
        let prediction = block_on(client.submit()).unwrap();
        let state = block_on(client.state());

        assert_eq!(prediction, Prediction::new(88.8));
        assert_eq!(state.status, Status::DisplayingResult);
        assert_eq!(state.prediction, Some(prediction));
        assert_eq!(
            predictor.payloads.lock().unwrap()[0].vehicle_type.as_str(),
            "Premium"
        );
        assert!(notifier.alerts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn client_failure_alerts_and_clears_result() {
        let (client, predictor, notifier) = client();

        predictor.gate().send(Ok(Prediction::new(50.0))).unwrap();
        client.submit().await.unwrap();

        predictor
            .gate()
            .send(Err(upstream_status_error(500).with_detail("model unavailable")))
            .unwrap();
        let err = client.submit().await.unwrap_err();

        assert_eq!(err.diagnostic(), "model unavailable");

        let state = client.state().await;
        assert_eq!(state.prediction, None);
        assert_eq!(state.status.name(), "displaying_error");
        assert_eq!(
            notifier.alerts.lock().unwrap().as_slice(),
            &[ALERT_MESSAGE.to_string()]
        );
    }

    #[tokio::test]
    async fn latest_submission_wins_even_when_it_resolves_first() {
        let (client, predictor, notifier) = client();
        let first_gate = predictor.gate();
        let second_gate = predictor.gate();

        let (first, second, _) = tokio::join!(
            client.submit(),
            async {
                client.update_field(Field::NumberOfRiders, "5").await.unwrap();
                client.submit().await
            },
            async {
                second_gate.send(Ok(Prediction::new(200.0))).unwrap();
                while client.state().await.status != Status::DisplayingResult {
                    tokio::task::yield_now().await;
                }
                first_gate
                    .send(Err(upstream_status_error(503).with_detail("late")))
                    .unwrap();
            }
        );

        assert!(first.is_err());
        assert_eq!(second.unwrap(), Prediction::new(200.0));

        let payloads = predictor.payloads.lock().unwrap().clone();
        assert_eq!(payloads[0].number_of_riders, 0);
        assert_eq!(payloads[1].number_of_riders, 5);

        let state = client.state().await;
        assert_eq!(state.prediction, Some(Prediction::new(200.0)));
        assert_eq!(state.status, Status::DisplayingResult);

        // the stale failure never reaches the user
        assert!(notifier.alerts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failure_detail_is_written_to_the_log() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (client, predictor, _) = client();
        predictor
            .gate()
            .send(Err(upstream_status_error(500).with_detail("model unavailable")))
            .unwrap();

        client.submit().await.unwrap_err();

        let output = logs.contents();
        assert!(output.contains("ERROR"), "{}", output);
        assert!(output.contains("model unavailable"), "{}", output);
        assert!(!output.contains("upstream responded with status 500"), "{}", output);
    }
}
