use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use wiremock::{MockServer, Mock, ResponseTemplate};
use wiremock::matchers::{body_json, header, method, path};

use appointment_cell::{
    Appointment, AppointmentStatus, ConfirmationPoller, ConfirmationSource,
    DoctorSummary, HttpConfirmationSource, PollerError, PollerState, RefreshHook,
};

type Scripted = Result<Vec<Appointment>, PollerError>;

#[derive(Clone, Default)]
struct ScriptedSource {
    responses: Arc<Mutex<VecDeque<Scripted>>>,
    calls: Arc<Mutex<Vec<Vec<Uuid>>>>,
}

impl ScriptedSource {
    fn respond(&self, response: Scripted) {
        self.responses.lock().unwrap().push_back(response);
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn last_known_ids(&self) -> HashSet<Uuid> {
        self.calls.lock().unwrap().last().cloned().unwrap_or_default().into_iter().collect()
    }
}

#[async_trait]
impl ConfirmationSource for ScriptedSource {
    async fn fetch_new_confirmations(&self, known_ids: &[Uuid]) -> Result<Vec<Appointment>, PollerError> {
        self.calls.lock().unwrap().push(known_ids.to_vec());
        self.responses.lock().unwrap().pop_front().unwrap_or(Ok(vec![]))
    }
}

fn counting_refresh() -> (Arc<dyn RefreshHook>, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    let hook: Arc<dyn RefreshHook> = Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (hook, count)
}

fn appointment(id: Uuid, doctor_name: &str, price: Option<i64>) -> Appointment {
    let doctor_id = Uuid::new_v4();
    Appointment {
        id,
        user_id: Uuid::new_v4(),
        doctor_id,
        date: Utc::now() + chrono::Duration::days(2),
        status: AppointmentStatus::AwaitingPayment,
        price,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        doctor: Some(DoctorSummary {
            id: doctor_id,
            name: doctor_name.to_string(),
            specialty: None,
        }),
        user: None,
    }
}

#[tokio::test]
async fn announces_only_unknown_appointments() {
    let known = Uuid::new_v4();
    let fresh = Uuid::new_v4();

    let source = ScriptedSource::default();
    source.respond(Ok(vec![
        appointment(fresh, "Dr. Lee", Some(30000)),
        appointment(known, "Dr. Choi", Some(10000)),
    ]));
    source.respond(Ok(vec![appointment(fresh, "Dr. Lee", Some(30000))]));

    let (refresh, refreshes) = counting_refresh();
    let mut poller = ConfirmationPoller::new(source.clone(), [known], refresh);

    let notice = poller.poll_once().await.expect("first poll announces");
    assert_eq!(notice.appointment_id, fresh);
    assert_eq!(notice.doctor_name, "Dr. Lee");
    assert_eq!(notice.price, Some(30000));
    assert!(notice.message.contains("Dr. Lee"));
    assert!(notice.message.contains("30000"));

    assert_eq!(poller.known_ids(), &HashSet::from([known, fresh]));
    assert_matches!(poller.state(), PollerState::Notifying(n) if n.appointment_id == fresh);
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);

    // Re-delivery of an already announced appointment stays silent.
    assert!(poller.poll_once().await.is_none());
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(source.last_known_ids(), HashSet::from([known, fresh]));
}

#[tokio::test]
async fn all_new_ids_are_remembered_but_only_the_first_is_shown() {
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    let source = ScriptedSource::default();
    source.respond(Ok(vec![
        appointment(first, "Dr. Han", Some(20000)),
        appointment(second, "Dr. Yoon", Some(25000)),
    ]));

    let (refresh, _) = counting_refresh();
    let mut poller = ConfirmationPoller::new(source, Vec::new(), refresh);

    let notice = poller.poll_once().await.unwrap();
    assert_eq!(notice.appointment_id, first);
    assert!(poller.known_ids().contains(&second));
}

#[tokio::test]
async fn dismiss_returns_to_idle_without_forgetting() {
    let fresh = Uuid::new_v4();
    let source = ScriptedSource::default();
    source.respond(Ok(vec![appointment(fresh, "Dr. Lee", Some(30000))]));

    let (refresh, _) = counting_refresh();
    let mut poller = ConfirmationPoller::new(source, Vec::new(), refresh);
    poller.poll_once().await;
    assert!(poller.hide_deadline().is_some());

    poller.dismiss();

    assert_eq!(poller.state(), &PollerState::Idle);
    assert!(poller.hide_deadline().is_none());
    assert!(poller.known_ids().contains(&fresh));
}

#[tokio::test]
async fn network_errors_are_swallowed() {
    let fresh = Uuid::new_v4();
    let source = ScriptedSource::default();
    source.respond(Err(PollerError::Network("connection refused".to_string())));
    source.respond(Ok(vec![appointment(fresh, "Dr. Lee", Some(30000))]));

    let (refresh, refreshes) = counting_refresh();
    let mut poller = ConfirmationPoller::new(source, Vec::new(), refresh);

    assert!(poller.poll_once().await.is_none());
    assert_eq!(poller.state(), &PollerState::Idle);
    assert_eq!(refreshes.load(Ordering::SeqCst), 0);

    assert!(poller.poll_once().await.is_some());
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn notification_hides_itself_after_five_seconds() {
    let fresh = Uuid::new_v4();
    let source = ScriptedSource::default();
    source.respond(Ok(vec![appointment(fresh, "Dr. Lee", Some(30000))]));

    let (refresh, refreshes) = counting_refresh();
    let handle = ConfirmationPoller::new(source.clone(), Vec::new(), refresh).spawn();

    // Nothing is polled before the first interval elapses.
    tokio::time::sleep(Duration::from_millis(4900)).await;
    assert_eq!(source.call_count(), 0);
    assert_eq!(handle.state(), PollerState::Idle);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(source.call_count(), 1);
    assert_matches!(handle.state(), PollerState::Notifying(n) if n.appointment_id == fresh);
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(handle.state(), PollerState::Idle);
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn explicit_dismiss_is_immediate() {
    let fresh = Uuid::new_v4();
    let source = ScriptedSource::default();
    source.respond(Ok(vec![appointment(fresh, "Dr. Lee", Some(30000))]));

    let (refresh, _) = counting_refresh();
    let handle = ConfirmationPoller::new(source.clone(), Vec::new(), refresh).spawn();

    tokio::time::sleep(Duration::from_millis(5100)).await;
    assert_matches!(handle.state(), PollerState::Notifying(_));

    handle.dismiss();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(handle.state(), PollerState::Idle);

    // The next poll still reports the dismissed appointment as known.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(source.call_count(), 2);
    assert!(source.last_known_ids().contains(&fresh));

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn teardown_stops_polling() {
    let source = ScriptedSource::default();
    let (refresh, _) = counting_refresh();

    let handle = ConfirmationPoller::new(source.clone(), Vec::new(), refresh).spawn();
    tokio::time::sleep(Duration::from_millis(10_100)).await;
    assert_eq!(source.call_count(), 2);

    drop(handle);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(source.call_count(), 2);
}

#[tokio::test]
async fn http_source_posts_known_ids_with_the_session_token() {
    let mock_server = MockServer::start().await;
    let known = Uuid::new_v4();
    let fresh = appointment(Uuid::new_v4(), "Dr. Lee", Some(30000));

    Mock::given(method("POST"))
        .and(path("/appointments/confirmations/check"))
        .and(header("authorization", "Bearer session-token"))
        .and(body_json(json!({ "known_ids": [known] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "appointments": [fresh]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let source = HttpConfirmationSource::new(&format!("{}/", mock_server.uri()), "session-token");
    let appointments = tokio_test::assert_ok!(source.fetch_new_confirmations(&[known]).await);

    assert_eq!(appointments, vec![fresh]);
}

#[tokio::test]
async fn http_source_reports_failures_as_network_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/appointments/confirmations/check"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let source = HttpConfirmationSource::new(&mock_server.uri(), "session-token");
    let result = source.fetch_new_confirmations(&[]).await;

    assert_matches!(result, Err(PollerError::Network(msg)) if msg.contains("503"));
}
