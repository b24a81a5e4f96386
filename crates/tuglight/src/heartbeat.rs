//! Heartbeat liveness monitor
//!
//! Detects a transport that died silently without the platform closing it.
//! The monitor only counts; the session owns the interval timer, sends the
//! heartbeat frames, and tears down the connection when told liveness is lost.

use std::time::Duration;

/// Period between heartbeat ticks
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(3000);

/// Consecutive silent ticks after which the link is declared dead
pub const MAX_MISSED_HEARTBEATS: u32 = 3;

/// Disconnect reason reported when the monitor gives up
pub const LIVENESS_LOST_REASON: &str = "Too many missed heartbeats.";

/// Lifecycle of one monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Running,
    /// Terminal; a new session is needed to monitor again
    Stopped,
}

/// Link health as seen by the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    /// Traffic seen since the last tick
    Alive,
    /// At least one tick without traffic
    Suspect,
    Lost,
}

/// What the session must do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    SendHeartbeat,
    LivenessLost,
    /// Monitor is not running; nothing to do
    Idle,
}

#[derive(Debug)]
pub struct HeartbeatMonitor {
    state: MonitorState,
    missed: u32,
    max_missed: u32,
    lost: bool,
}

impl HeartbeatMonitor {
    pub fn new(max_missed: u32) -> Self {
        HeartbeatMonitor {
            state: MonitorState::Idle,
            missed: 0,
            max_missed: max_missed.max(1),
            lost: false,
        }
    }

    /// Start monitoring; only effective from `Idle`
    ///
    /// Returns whether the monitor actually started, so the caller arms its
    /// timer at most once.
    pub fn start(&mut self) -> bool {
        if self.state != MonitorState::Idle {
            return false;
        }
        self.state = MonitorState::Running;
        self.missed = 0;
        true
    }

    pub fn tick(&mut self) -> HeartbeatAction {
        if self.state != MonitorState::Running {
            return HeartbeatAction::Idle;
        }

        self.missed += 1;
        if self.missed >= self.max_missed {
            self.state = MonitorState::Stopped;
            self.lost = true;
            return HeartbeatAction::LivenessLost;
        }
        HeartbeatAction::SendHeartbeat
    }

    /// Any inbound status message proves the link is alive
    pub fn observe_traffic(&mut self) {
        self.missed = 0;
    }

    pub fn stop(&mut self) {
        self.state = MonitorState::Stopped;
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn missed(&self) -> u32 {
        self.missed
    }

    pub fn liveness(&self) -> Liveness {
        if self.lost {
            Liveness::Lost
        } else if self.missed == 0 {
            Liveness::Alive
        } else {
            Liveness::Suspect
        }
    }
}

impl Default for HeartbeatMonitor {
    fn default() -> Self {
        HeartbeatMonitor::new(MAX_MISSED_HEARTBEATS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_constants() {
        assert_eq!(HEARTBEAT_INTERVAL, Duration::from_millis(3000));
        assert_eq!(MAX_MISSED_HEARTBEATS, 3);
        assert_eq!(LIVENESS_LOST_REASON, "Too many missed heartbeats.");
    }

    #[test]
    fn test_start_only_from_idle() {
        let mut monitor = HeartbeatMonitor::default();
        assert_eq!(monitor.state(), MonitorState::Idle);
        assert!(monitor.start());
        assert_eq!(monitor.state(), MonitorState::Running);
        assert!(!monitor.start());

        monitor.stop();
        assert!(!monitor.start());
        assert_eq!(monitor.state(), MonitorState::Stopped);
    }

    #[test]
    fn test_tick_before_start_is_idle() {
        let mut monitor = HeartbeatMonitor::default();
        assert_eq!(monitor.tick(), HeartbeatAction::Idle);
        assert_eq!(monitor.missed(), 0);
    }

    #[test]
    fn test_three_silent_ticks_lose_liveness_once() {
        let mut monitor = HeartbeatMonitor::default();
        monitor.start();

        assert_eq!(monitor.tick(), HeartbeatAction::SendHeartbeat);
        assert_eq!(monitor.liveness(), Liveness::Suspect);
        assert_eq!(monitor.tick(), HeartbeatAction::SendHeartbeat);
        assert_eq!(monitor.tick(), HeartbeatAction::LivenessLost);
        assert_eq!(monitor.state(), MonitorState::Stopped);
        assert_eq!(monitor.liveness(), Liveness::Lost);

        for _ in 0..10 {
            assert_eq!(monitor.tick(), HeartbeatAction::Idle);
        }
    }

    #[test]
    fn test_traffic_resets_counter() {
        let mut monitor = HeartbeatMonitor::default();
        monitor.start();

        for _ in 0..20 {
            assert_eq!(monitor.tick(), HeartbeatAction::SendHeartbeat);
            assert_eq!(monitor.tick(), HeartbeatAction::SendHeartbeat);
            monitor.observe_traffic();
            assert_eq!(monitor.missed(), 0);
            assert_eq!(monitor.liveness(), Liveness::Alive);
        }
        assert_eq!(monitor.state(), MonitorState::Running);
    }

    #[test]
    fn test_stop_prevents_liveness_loss() {
        let mut monitor = HeartbeatMonitor::default();
        monitor.start();
        monitor.tick();
        monitor.stop();
        assert_eq!(monitor.tick(), HeartbeatAction::Idle);
        assert_ne!(monitor.liveness(), Liveness::Lost);
    }

    #[test]
    fn test_custom_threshold() {
        let mut monitor = HeartbeatMonitor::new(1);
        monitor.start();
        assert_eq!(monitor.tick(), HeartbeatAction::LivenessLost);

        let mut monitor = HeartbeatMonitor::new(0);
        monitor.start();
        assert_eq!(monitor.tick(), HeartbeatAction::LivenessLost);
    }
}
