//! Conversation controller integration tests
//!
//! Drives the controller with in-memory services on a paused clock.

use std::sync::atomic::Ordering;
use std::time::Duration;

use surya::State;
use surya::config::Config;
use surya::voice::Transcriber;

mod common;

use common::{FakePlanner, Harness, Reply, settle};

const CONFIRMATION: &str = "Yes, I'm listening";
const GOODBYE: &str = "Goodbye! Have a great day!";
const APOLOGY: &str =
    "I apologize, but I encountered an error processing your request. Please try again.";

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn test_starts_in_wake_word_mode() {
    let h = Harness::start(FakePlanner::replying("hi")).await;

    assert_eq!(h.state(), State::WakeWordOnly);
    assert!(h.transcriber.is_listening());
    assert_eq!(
        h.status.last_status().as_deref(),
        Some("Say 'Hello Surya' to activate")
    );
}

#[tokio::test(start_paused = true)]
async fn test_text_without_wake_word_is_ignored() {
    let h = Harness::start(FakePlanner::replying("hi")).await;

    h.say("what time is it").await;
    h.say("bye").await;

    assert_eq!(h.state(), State::WakeWordOnly);
    assert_eq!(h.planner.call_count(), 0);
    assert!(h.synthesizer.spoken().is_empty());
    assert!(h.transcriber.is_listening());
}

#[tokio::test(start_paused = true)]
async fn test_wake_word_activates_after_delay() {
    let h = Harness::start(FakePlanner::replying("hi")).await;

    h.say("Hello Surya").await;

    assert_eq!(h.state(), State::Speaking);
    assert_eq!(h.synthesizer.spoken(), vec![CONFIRMATION]);
    assert!(!h.transcriber.is_listening());
    assert_eq!(h.status.count("Activating..."), 1);

    h.finish_speaking().await;

    // Confirmation done, but the activation delay has not elapsed
    sleep_ms(2400).await;
    assert_eq!(h.state(), State::Speaking);
    assert!(!h.transcriber.is_listening());

    sleep_ms(200).await;
    assert_eq!(h.state(), State::ActiveListening);
    assert!(h.transcriber.is_listening());
    assert_eq!(h.status.last_status().as_deref(), Some("Listening..."));
    assert_eq!(h.planner.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_wake_word_in_devanagari() {
    let h = Harness::start(FakePlanner::replying("hi")).await;

    h.say("नमस्ते सूर्या").await;

    assert_eq!(h.state(), State::Speaking);
    assert_eq!(h.synthesizer.spoken(), vec![CONFIRMATION]);
}

#[tokio::test(start_paused = true)]
async fn test_restart_deferred_while_still_speaking() {
    let h = Harness::start(FakePlanner::replying("hi")).await;

    h.say("hello surya").await;

    // Confirmation still playing when the activation delay elapses
    sleep_ms(3000).await;
    assert_eq!(h.state(), State::Speaking);
    assert!(!h.transcriber.is_listening());

    h.finish_speaking().await;
    sleep_ms(400).await;
    assert!(!h.transcriber.is_listening());

    sleep_ms(200).await;
    assert_eq!(h.state(), State::ActiveListening);
    assert!(h.transcriber.is_listening());
}

#[tokio::test(start_paused = true)]
async fn test_command_round_trip() {
    let h = Harness::start(FakePlanner::replying("It's 3 PM.")).await;
    h.activate().await;

    h.say("what time is it").await;

    assert_eq!(h.planner.call_count(), 1);
    assert_eq!(*h.planner.inputs.lock().unwrap(), vec!["what time is it"]);
    assert_eq!(h.state(), State::Speaking);
    assert_eq!(h.synthesizer.spoken().last().map(String::as_str), Some("It's 3 PM."));
    assert!(!h.transcriber.is_listening());
    assert!(h.status.count("Thinking...") >= 1);

    h.finish_speaking().await;
    assert_eq!(h.state(), State::Speaking);

    sleep_ms(600).await;
    assert_eq!(h.state(), State::ActiveListening);
    assert!(h.transcriber.is_listening());
    assert_eq!(h.planner.call_count(), 1);

    let states = h.status.states();
    assert_eq!(
        states[states.len() - 4..],
        [
            State::ActiveListening,
            State::Processing,
            State::Speaking,
            State::ActiveListening
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_no_second_planner_call_while_processing() {
    let planner = FakePlanner::new(Reply::Slow(Duration::from_secs(1), "done".to_string()));
    let h = Harness::start(planner).await;
    h.activate().await;

    let session = h.transcriber.session_count() - 1;
    h.say("first request").await;
    assert_eq!(h.state(), State::Processing);

    // Late text from the session that was active before processing began
    h.transcriber.say_in_session(session, "second request");
    h.say("third request").await;

    sleep_ms(1100).await;
    assert_eq!(h.planner.call_count(), 1);
    assert_eq!(*h.planner.inputs.lock().unwrap(), vec!["first request"]);
    assert_eq!(h.synthesizer.spoken().last().map(String::as_str), Some("done"));
}

#[tokio::test(start_paused = true)]
async fn test_planner_error_speaks_apology() {
    let h = Harness::start(FakePlanner::new(Reply::Fail)).await;
    h.activate().await;

    h.say("do something").await;

    assert_eq!(h.state(), State::Speaking);
    assert_eq!(h.synthesizer.spoken().last().map(String::as_str), Some(APOLOGY));

    h.finish_speaking().await;
    sleep_ms(600).await;
    assert_eq!(h.state(), State::ActiveListening);
}

#[tokio::test(start_paused = true)]
async fn test_planner_panic_speaks_apology() {
    let h = Harness::start(FakePlanner::new(Reply::Panic)).await;
    h.activate().await;

    h.say("do something").await;

    assert_eq!(h.state(), State::Speaking);
    assert_eq!(h.synthesizer.spoken().last().map(String::as_str), Some(APOLOGY));
}

#[tokio::test(start_paused = true)]
async fn test_blank_reply_replaced_by_apology() {
    let h = Harness::start(FakePlanner::replying("   ")).await;
    h.activate().await;

    h.say("hello?").await;

    assert_eq!(h.synthesizer.spoken().last().map(String::as_str), Some(APOLOGY));
}

#[tokio::test(start_paused = true)]
async fn test_exit_keyword_shuts_down_once() {
    let h = Harness::start(FakePlanner::replying("hi")).await;
    h.activate().await;

    h.say("okay goodbye").await;

    assert_eq!(h.planner.call_count(), 0);
    assert_eq!(h.synthesizer.spoken().last().map(String::as_str), Some(GOODBYE));
    assert!(!h.transcriber.is_listening());
    assert_eq!(h.status.last_status().as_deref(), Some("Shutting down..."));
    assert_eq!(h.synthesizer.shutdowns.load(Ordering::SeqCst), 0);

    sleep_ms(3100).await;

    assert_eq!(h.state(), State::Terminated);
    assert_eq!(h.synthesizer.shutdowns.load(Ordering::SeqCst), 1);
    assert!(!h.handle.is_running());

    h.handle.shutdown();
    settle().await;

    let goodbyes = h.synthesizer.spoken().iter().filter(|s| *s == GOODBYE).count();
    assert_eq!(goodbyes, 1);
    assert_eq!(h.synthesizer.shutdowns.load(Ordering::SeqCst), 1);
    assert_eq!(h.status.count("Shutting down..."), 1);

    tokio::time::timeout(Duration::from_secs(1), h.task)
        .await
        .expect("controller did not exit")
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_exit_keyword_checked_before_command() {
    let h = Harness::start(FakePlanner::replying("hi")).await;
    h.activate().await;

    h.say("please stop now").await;

    assert_eq!(h.planner.call_count(), 0);
    assert_eq!(h.synthesizer.spoken().last().map(String::as_str), Some(GOODBYE));
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent() {
    let h = Harness::start(FakePlanner::replying("hi")).await;
    h.activate().await;

    h.handle.stop();
    settle().await;

    let statuses = h.status.statuses();
    let states = h.status.states();
    assert_eq!(h.state(), State::Stopped);
    assert!(!h.transcriber.is_listening());
    assert_eq!(h.status.count("Stopped"), 1);

    h.handle.stop();
    settle().await;

    assert_eq!(h.state(), State::Stopped);
    assert_eq!(h.status.statuses(), statuses);
    assert_eq!(h.status.states(), states);
    assert!(!h.transcriber.is_listening());
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_pending_restart() {
    let h = Harness::start(FakePlanner::replying("hi")).await;

    h.say("hello surya").await;
    h.finish_speaking().await;
    h.handle.stop();
    settle().await;

    sleep_ms(3000).await;
    assert_eq!(h.state(), State::Stopped);
    assert!(!h.transcriber.is_listening());
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_processing_discards_reply() {
    let planner = FakePlanner::new(Reply::Slow(Duration::from_secs(1), "late".to_string()));
    let h = Harness::start(planner).await;
    h.activate().await;

    h.say("slow question").await;
    assert_eq!(h.state(), State::Processing);

    h.handle.stop();
    settle().await;
    sleep_ms(1500).await;

    assert_eq!(h.state(), State::Stopped);
    assert_eq!(h.synthesizer.spoken(), vec![CONFIRMATION]);
    assert!(!h.transcriber.is_listening());
}

#[tokio::test(start_paused = true)]
async fn test_stop_aborts_planner_call() {
    let planner = FakePlanner::new(Reply::Slow(Duration::from_secs(5), "answer".to_string()));
    let h = Harness::start(planner).await;
    h.activate().await;

    h.say("first question").await;
    assert_eq!(h.planner.running(), 1);

    h.handle.toggle();
    settle().await;
    assert_eq!(h.state(), State::Stopped);
    assert_eq!(h.planner.running(), 0);

    // A new command after re-activation never overlaps the abandoned one
    h.handle.toggle();
    settle().await;
    h.say("second question").await;
    assert_eq!(h.planner.call_count(), 2);
    assert_eq!(h.planner.running(), 1);
    assert_eq!(h.planner.max_concurrent(), 1);

    sleep_ms(5500).await;
    assert_eq!(h.state(), State::Speaking);
    assert_eq!(h.synthesizer.spoken(), vec![CONFIRMATION, "answer"]);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_aborts_planner_call() {
    let planner = FakePlanner::new(Reply::Slow(Duration::from_secs(5), "answer".to_string()));
    let h = Harness::start(planner).await;
    h.activate().await;

    h.say("question").await;
    assert_eq!(h.planner.running(), 1);

    h.handle.shutdown();
    settle().await;

    assert_eq!(h.state(), State::Terminated);
    assert_eq!(h.planner.running(), 0);
    assert_eq!(h.synthesizer.spoken(), vec![CONFIRMATION]);
}

#[tokio::test(start_paused = true)]
async fn test_toggle_while_speaking_stops() {
    let h = Harness::start(FakePlanner::replying("hi")).await;
    h.activate().await;

    h.say("hello").await;
    assert_eq!(h.state(), State::Speaking);

    h.handle.toggle();
    settle().await;
    assert_eq!(h.state(), State::Stopped);

    // Playback tail after the stop does not re-arm listening
    h.finish_speaking().await;
    sleep_ms(1000).await;
    assert_eq!(h.state(), State::Stopped);
    assert!(!h.transcriber.is_listening());
}

#[tokio::test(start_paused = true)]
async fn test_toggle_from_wake_mode_listens_immediately() {
    let h = Harness::start(FakePlanner::replying("hi")).await;

    h.handle.toggle();
    settle().await;

    assert_eq!(h.state(), State::ActiveListening);
    assert!(h.transcriber.is_listening());
    assert!(h.synthesizer.spoken().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_toggle_stops_and_restarts() {
    let h = Harness::start(FakePlanner::replying("hi")).await;
    h.activate().await;

    h.handle.toggle();
    settle().await;
    assert_eq!(h.state(), State::Stopped);
    assert_eq!(h.status.last_status().as_deref(), Some("Stopped"));

    // Text from the stopped session is not acted on
    h.say("what time is it").await;
    assert_eq!(h.planner.call_count(), 0);

    h.handle.toggle();
    settle().await;
    assert_eq!(h.state(), State::ActiveListening);
    assert!(h.transcriber.is_listening());

    h.say("what time is it").await;
    assert_eq!(h.planner.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stale_session_text_dropped() {
    let h = Harness::start(FakePlanner::replying("hi")).await;
    h.activate().await;

    // Session 0 listened for the wake word; it is long gone
    h.transcriber.say_in_session(0, "tell me a joke");
    settle().await;

    assert_eq!(h.planner.call_count(), 0);
    assert_eq!(h.state(), State::ActiveListening);
}

#[tokio::test(start_paused = true)]
async fn test_transcription_error_reports_status() {
    let h = Harness::start(FakePlanner::replying("hi")).await;

    h.transcriber.fail("Speech recognition error: timeout");
    settle().await;

    assert_eq!(h.state(), State::WakeWordOnly);
    assert_eq!(
        h.status.last_status().as_deref(),
        Some("Error - Check microphone")
    );
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_services() {
    let h = Harness::start(FakePlanner::replying("hi")).await;

    h.say("hello surya").await;
    h.handle.shutdown();
    settle().await;

    assert_eq!(h.state(), State::Terminated);
    assert!(!h.transcriber.is_listening());
    assert_eq!(h.synthesizer.shutdowns.load(Ordering::SeqCst), 1);
    assert_eq!(h.status.last_status().as_deref(), Some("Shutting down..."));

    // Pending activation never fires
    sleep_ms(3000).await;
    assert_eq!(h.transcriber.starts.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_custom_phrases_and_timing() {
    let config = Config::load_from_str(
        r#"
        [assistant]
        name = "Nova"
        wake_words = ["hey nova"]
        exit_words = ["see you"]
        confirmation = "Go ahead"

        [timing]
        activation_delay_ms = 100
        "#,
    )
    .unwrap();

    let h = Harness::start_with(&config, FakePlanner::replying("hi")).await;
    assert_eq!(
        h.status.last_status().as_deref(),
        Some("Say 'Hello Nova' to activate")
    );

    h.say("surya").await;
    assert_eq!(h.state(), State::WakeWordOnly);

    h.say("Hey Nova").await;
    assert_eq!(h.synthesizer.spoken(), vec!["Go ahead"]);
    h.finish_speaking().await;

    sleep_ms(150).await;
    assert_eq!(h.state(), State::ActiveListening);

    h.say("goodbye").await;
    assert_eq!(h.planner.call_count(), 1);
}
