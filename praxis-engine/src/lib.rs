//! Praxis Engine
//!
//! Platform-agnostic core logic for the Praxis personal gamification
//! system. This crate provides the full progression loop — rewards,
//! streaks, honor, skills, raids, badges, and the day-boundary state
//! machine — without UI or platform-specific dependencies.

pub mod attributes;
pub mod badges;
pub mod constants;
pub mod habit;
pub mod honor;
pub mod injector;
pub mod persist;
pub mod raid;
pub mod reward;
pub mod rng;
pub mod rollover;
pub mod session;
pub mod shop;
pub mod skill;
pub mod state;
pub mod task;

// Re-export commonly used types
pub use attributes::Attribute;
pub use badges::{BadgeAward, BadgeDefinition, BadgeTier, BadgeTrigger, default_registry};
pub use habit::{DailyStatus, Habit, HabitBook, HabitOutcome, HabitSchedule, streak_fall};
pub use honor::{
    HonorLog, Redemption, apply_daily_penalty, day_key, monthly_average, penalty_percent,
    redeem_lowest_score,
};
pub use injector::{
    HabitDraft, InjectionPayload, InjectionSummary, RaidDraft, SkillDraft, StepDraft, TaskDraft,
    apply_payload,
};
pub use persist::{DebouncedWriter, MemoryBackend, PersistError, StorageBackend, keys};
pub use raid::{
    EffectiveAttributes, Raid, RaidBook, RaidStatus, RaidStep, StepOutcome, resolve_effective,
};
pub use reward::{CompletionKind, GrantedReward, Reward, base_reward, roll_crit, stat_points};
pub use rng::RngBundle;
pub use rollover::{
    HabitResetSummary, RolloverDecision, RolloverOutcome, is_new_virtual_day, process_day_boundary,
    reset_habits, virtual_date,
};
pub use session::{Session, StateTree};
pub use shop::{PurchaseLog, PurchaseOutcome, ShopState, StoreItem, StoreItemKind, default_stock};
pub use skill::{Skill, SkillBook, SkillRank, add_skill_xp, is_rusty, next_level_xp};
pub use state::{
    Category, DailyMode, Difficulty, DifficultyCounts, Preferences, Profile, Reminder, Stat,
    Stats, StreakMark, Subtask, UserMetrics,
};
pub use task::{DeleteOutcome, Law, LawPenalty, Task, TaskBook, ToggleOutcome};

use chrono::{DateTime, Utc};
use persist::{load_snapshot, save_snapshot};

/// Binds a storage backend to sessions: loads the per-collection snapshots
/// into a state tree and writes them back, debounced or immediately.
pub struct Engine<B: StorageBackend> {
    backend: B,
    writer: DebouncedWriter,
}

impl<B: StorageBackend> Engine<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            writer: DebouncedWriter::new(),
        }
    }

    /// Load a session from storage. Each sub-collection degrades
    /// independently (main, backup, initial state); one corrupt snapshot
    /// never takes the others down with it.
    #[must_use]
    pub fn load_session(&self, seed: u64) -> Session {
        let state = StateTree {
            profile: load_snapshot(&self.backend, keys::PROFILE),
            tasks: load_snapshot(&self.backend, keys::TASKS),
            habits: load_snapshot(&self.backend, keys::HABITS),
            raids: load_snapshot(&self.backend, keys::RAIDS),
            skills: load_snapshot(&self.backend, keys::SKILLS),
            shop: load_snapshot(&self.backend, keys::SHOP),
        };
        Session::from_state(state, seed)
    }

    /// Queue every sub-collection for a debounced write.
    pub fn schedule_save(&mut self, session: &Session, now: DateTime<Utc>) {
        let state = &session.state;
        let entries: [(&str, Result<(), serde_json::Error>); 6] = [
            (keys::PROFILE, self.writer.schedule(keys::PROFILE, &state.profile, now)),
            (keys::TASKS, self.writer.schedule(keys::TASKS, &state.tasks, now)),
            (keys::HABITS, self.writer.schedule(keys::HABITS, &state.habits, now)),
            (keys::RAIDS, self.writer.schedule(keys::RAIDS, &state.raids, now)),
            (keys::SKILLS, self.writer.schedule(keys::SKILLS, &state.skills, now)),
            (keys::SHOP, self.writer.schedule(keys::SHOP, &state.shop, now)),
        ];
        for (key, result) in entries {
            if let Err(err) = result {
                log::warn!("snapshot encode failed for {key}: {err}");
            }
        }
    }

    /// Flush queued writes whose debounce window has elapsed.
    pub fn flush_due(&mut self, now: DateTime<Utc>) -> usize {
        self.writer.flush_due(&self.backend, now)
    }

    /// Write everything immediately, bypassing the debounce (shutdown).
    ///
    /// # Errors
    ///
    /// Returns the first encode or backend error encountered.
    pub fn save_now(&mut self, session: &Session) -> Result<(), PersistError<B::Error>> {
        // Drain stale queued writes first so they cannot land on top of
        // the fresh snapshots below.
        self.writer.flush_all(&self.backend);
        let state = &session.state;
        save_snapshot(&self.backend, keys::PROFILE, &state.profile)?;
        save_snapshot(&self.backend, keys::TASKS, &state.tasks)?;
        save_snapshot(&self.backend, keys::HABITS, &state.habits)?;
        save_snapshot(&self.backend, keys::RAIDS, &state.raids)?;
        save_snapshot(&self.backend, keys::SKILLS, &state.skills)?;
        save_snapshot(&self.backend, keys::SHOP, &state.shop)?;
        Ok(())
    }
}
