//! Per-session timer queue
//!
//! Every deferral in a session (settle pause, projectile wave spawns,
//! invulnerability flashes, delayed projectile removal) is an entry here.
//! Game over and restart cancel the whole queue, so a stale timer can never
//! touch a new session.

use super::state::EntityId;

/// Handle returned by [`TimerQueue::schedule`], used to cancel one timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// What happens when a timer fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Post-landing pause is over
    SettleElapsed,
    /// Launch projectile `index` of the running wave
    LaunchProjectile { index: u32 },
    /// Projectile wave is over, drop the next block
    WaveComplete,
    /// Despawn a projectile after its impact beat
    RemoveProjectile(EntityId),
    /// Toggle the platform flash; `count` toggles have happened so far
    InvulnerabilityFlash { count: u32 },
    /// Clear a block's hit flash
    ClearBlockFlash(EntityId),
}

#[derive(Debug, Clone)]
struct Timer {
    handle: TimerHandle,
    due_ms: f64,
    action: TimerAction,
}

/// Cancelable timers keyed on the session clock
#[derive(Debug, Clone, Default)]
pub struct TimerQueue {
    pending: Vec<Timer>,
    next_handle: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` to fire `delay_ms` after `now_ms`
    pub fn schedule(&mut self, now_ms: f64, delay_ms: f32, action: TimerAction) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.pending.push(Timer {
            handle,
            due_ms: now_ms + delay_ms.max(0.0) as f64,
            action,
        });
        handle
    }

    /// Cancel one timer; returns false if it already fired or was cancelled
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|t| t.handle != handle);
        self.pending.len() != before
    }

    /// Cancel everything outstanding
    pub fn cancel_all(&mut self) {
        if !self.pending.is_empty() {
            log::debug!("Cancelling {} pending timers", self.pending.len());
        }
        self.pending.clear();
    }

    /// Remove and return every action due at `now_ms`, earliest first.
    /// Ties fire in scheduling order.
    pub fn drain_due(&mut self, now_ms: f64) -> Vec<TimerAction> {
        let mut due: Vec<Timer> = Vec::new();
        self.pending.retain(|t| {
            if t.due_ms <= now_ms {
                due.push(t.clone());
                false
            } else {
                true
            }
        });
        due.sort_by(|a, b| a.due_ms.total_cmp(&b.due_ms).then(a.handle.cmp(&b.handle)));
        due.into_iter().map(|t| t.action).collect()
    }

    /// Whether an identical action is still pending
    pub fn contains(&self, action: &TimerAction) -> bool {
        self.pending.iter().any(|t| t.action == *action)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_in_due_order() {
        let mut timers = TimerQueue::new();
        timers.schedule(0.0, 300.0, TimerAction::WaveComplete);
        timers.schedule(0.0, 100.0, TimerAction::SettleElapsed);
        timers.schedule(0.0, 100.0, TimerAction::LaunchProjectile { index: 0 });

        assert!(timers.drain_due(50.0).is_empty());
        assert_eq!(
            timers.drain_due(150.0),
            vec![
                TimerAction::SettleElapsed,
                TimerAction::LaunchProjectile { index: 0 }
            ]
        );
        assert_eq!(timers.drain_due(1000.0), vec![TimerAction::WaveComplete]);
        assert!(timers.is_empty());
    }

    #[test]
    fn test_cancel_single() {
        let mut timers = TimerQueue::new();
        let handle = timers.schedule(0.0, 10.0, TimerAction::SettleElapsed);
        assert!(timers.cancel(handle));
        assert!(!timers.cancel(handle));
        assert!(timers.drain_due(100.0).is_empty());
    }

    #[test]
    fn test_cancel_all_leaves_nothing_due() {
        let mut timers = TimerQueue::new();
        for index in 0..5 {
            timers.schedule(0.0, index as f32 * 10.0, TimerAction::LaunchProjectile { index });
        }
        timers.cancel_all();
        assert!(timers.drain_due(f64::MAX).is_empty());
    }

    #[test]
    fn test_contains() {
        let mut timers = TimerQueue::new();
        timers.schedule(0.0, 400.0, TimerAction::RemoveProjectile(EntityId(7)));
        assert!(timers.contains(&TimerAction::RemoveProjectile(EntityId(7))));
        assert!(!timers.contains(&TimerAction::RemoveProjectile(EntityId(8))));
    }
}
