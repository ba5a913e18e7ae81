//! Playback tests on a paused clock.

use std::future::pending;
use std::net::Ipv4Addr;
use std::time::Duration;

use tokio::time::Instant;

use netsight::scenario::TcpState;
use netsight::{AppConfig, FixedMetrics, Outcome, OutputFormat, PlaybackEnd, Player};
use netsight_common::Category;

fn player(category: Category) -> Player<Vec<u8>> {
    let config = AppConfig::bundled().unwrap();
    let scenario = config.scenarios.build(category).unwrap();
    let metrics = FixedMetrics::new(0.6, Ipv4Addr::new(10, 0, 0, 7));

    Player::new(scenario, Box::new(metrics), Vec::new()).with_budget(config.budget(category))
}

fn output(player: Player<Vec<u8>>) -> String {
    String::from_utf8(player.into_output()).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_single_pass_finishes() {
    let mut player = player(Category::Http);
    let report = player.run_until(pending()).await.unwrap();

    assert_eq!(report.end, PlaybackEnd::Finished);
    assert_eq!(report.passes, 1);
    assert_eq!(report.runs_started, 1);
    assert!(!player.sequencer().is_running());

    let Some(Outcome::Http(response)) = &report.outcome else {
        panic!("expected an HTTP response, got {:?}", report.outcome);
    };
    assert_eq!(response.status, 200);
    assert_eq!(response.elapsed_ms, 8000);

    let text = output(player);
    assert!(text.starts_with("== Request/response cycle (7 steps) =="));
    assert!(text.contains("[1/7] DNS Lookup"));
    assert!(text.contains("●○ [6/7] Send Response"));
    assert!(text.contains("=> GET https://api.example.com/users/123 -> HTTP/1.1 200 OK"));
    assert!(text.contains("-- HTTP Request: finished after 1 pass(es)"));
}

#[tokio::test(start_paused = true)]
async fn test_phases_play_back_to_back() {
    let mut player = player(Category::Tcp);
    let report = player.run_until(pending()).await.unwrap();

    assert_eq!(report.end, PlaybackEnd::Finished);
    assert_eq!(report.runs_started, 2);

    let Some(Outcome::Tcp(tcp)) = &report.outcome else {
        panic!("expected a TCP outcome");
    };
    assert_eq!(tcp.client, TcpState::TimeWait);
    assert_eq!(tcp.server, TcpState::Closed);

    let text = output(player);
    let handshake = text.find("phase 1/2").unwrap();
    let termination = text.find("phase 2/2").unwrap();
    let established = text.find("Established").unwrap();
    assert!(handshake < established && established < termination);
}

#[tokio::test(start_paused = true)]
async fn test_looping_stops_at_budget() {
    let start = Instant::now();
    let mut player = player(Category::LoadBalancer).with_budget(Duration::from_millis(5250));
    let report = player.run_until(pending()).await.unwrap();

    assert_eq!(report.end, PlaybackEnd::BudgetExhausted);
    assert_eq!(report.passes, 2);
    assert_eq!(report.runs_started, 3);
    assert!(start.elapsed() >= Duration::from_millis(5250));
    assert!(!player.sequencer().is_running());

    let Some(Outcome::LoadBalancer(routing)) = &report.outcome else {
        panic!("expected a routing outcome");
    };
    assert_eq!(routing.request, 2);
    assert_eq!(routing.server.as_deref(), Some("web-03"));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_interrupts() {
    let mut player = player(Category::Vpn);
    let report = player
        .run_until(tokio::time::sleep(Duration::from_millis(4500)))
        .await
        .unwrap();

    assert_eq!(report.end, PlaybackEnd::Interrupted);
    assert_eq!(report.passes, 0);
    assert!(report.outcome.is_none());

    let run = player.sequencer().current().cloned().unwrap();
    assert!(!run.is_running());
    assert_eq!(run.snapshot().current_index(), Some(1));

    let text = output(player);
    assert!(text.contains("[2/6] Encryption"));
    assert!(!text.contains("[3/6]"));
}

#[tokio::test(start_paused = true)]
async fn test_speed_scales_durations() {
    let start = Instant::now();
    let mut player = player(Category::Dns).with_speed(4.0);
    let report = player.run_until(pending()).await.unwrap();

    assert_eq!(report.end, PlaybackEnd::Finished);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(1740), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(1800), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_json_events() {
    let mut player = player(Category::Dns).with_format(OutputFormat::Json);
    player.run_until(pending()).await.unwrap();

    let events: Vec<serde_json::Value> = output(player)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(events.len(), 1 + 8 + 1 + 1);
    assert_eq!(events[0]["event"], "phase");

    for (index, event) in events[1..9].iter().enumerate() {
        assert_eq!(event["event"], "step");
        assert_eq!(event["index"], index);
        assert_eq!(event["statuses"][index], "active");

        let statuses = event["statuses"].as_array().unwrap();
        assert_eq!(statuses.len(), 8);
        let completed = statuses.iter().filter(|s| *s == "completed").count();
        let pending = statuses.iter().filter(|s| *s == "pending").count();
        assert_eq!(completed, index);
        assert_eq!(pending, 8 - index - 1);
    }
    assert_eq!(events[1]["id"], "browser-cache");
    assert_eq!(events[8]["statuses"][0], "completed");

    let outcome = &events[9];
    assert_eq!(outcome["event"], "outcome");
    assert_eq!(outcome["category"], "dns");
    assert_eq!(outcome["record"]["type"], "A");
    assert_eq!(outcome["hops"].as_array().map(Vec::len), Some(8));

    assert_eq!(events[10]["event"], "end");
    assert_eq!(events[10]["end"], "finished");
    assert_eq!(events[10]["passes"], 1);
}

#[tokio::test(start_paused = true)]
async fn test_step_statuses_follow_each_phase() {
    let mut player = player(Category::Tcp).with_format(OutputFormat::Json);
    player.run_until(pending()).await.unwrap();

    let steps: Vec<serde_json::Value> = output(player)
        .lines()
        .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap())
        .filter(|event| event["event"] == "step")
        .collect();

    let config = AppConfig::bundled().unwrap();
    let phases = &config.scenarios.tcp.playbook.phases;
    assert_eq!(steps.len(), phases.iter().map(|p| p.steps.len()).sum::<usize>());

    let second = &phases[1];
    let last = steps.last().unwrap();
    assert_eq!(last["phase"], second.name.as_str());
    assert_eq!(
        last["statuses"].as_array().map(Vec::len),
        Some(second.steps.len())
    );
    assert_eq!(last["index"], second.steps.len() - 1);
}
