//! Store items and the purchase transaction engine.
//!
//! Every failure mode here is an expected, frequent condition reported as a
//! structured outcome; nothing in the purchase path panics or errors.
use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{PURCHASE_ID_PREFIX, PURCHASE_LOG_CAP, SHIELD_MAX};
use crate::honor::{self, Redemption};
use crate::rng::mint_id;
use crate::state::Profile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreItemKind {
    /// Consumable streak protection, +1 up to the cap.
    Shield,
    /// Recharges shields to full.
    Battery,
    /// Restores the worst honor day of the month.
    Redemption,
    /// One-time unlocks (themes, tools).
    System,
    /// Equippable artifacts.
    Artifact,
    Voucher,
    Potion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub cost: i64,
    pub kind: StoreItemKind,
    #[serde(default)]
    pub icon: String,
    /// Infinite items stay in stock after purchase.
    #[serde(default)]
    pub is_infinite: bool,
}

/// One entry in the profile's purchase history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseLog {
    pub id: String,
    pub item_id: String,
    pub title: String,
    pub cost: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ShopState {
    #[serde(default)]
    pub items: Vec<StoreItem>,
}

/// Result of a purchase attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseOutcome {
    Purchased,
    /// Redemption item: the restored day.
    HonorRestored { day: String },
    InsufficientGold,
    ShieldCapacity,
    AlreadyOwned,
    /// Redemption attempted with a perfect month; nothing charged.
    HonorAlreadyPerfect,
}

impl ShopState {
    #[must_use]
    pub fn find(&self, item_id: &str) -> Option<&StoreItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    /// Attempt a purchase. Missing ids return `None`; every other outcome
    /// is a structured result the caller can surface.
    pub fn buy<R: Rng + ?Sized>(
        &mut self,
        item_id: &str,
        profile: &mut Profile,
        today: NaiveDate,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Option<PurchaseOutcome> {
        let item = self.items.iter().find(|i| i.id == item_id)?.clone();

        if profile.gold < item.cost {
            return Some(PurchaseOutcome::InsufficientGold);
        }
        if item.kind == StoreItemKind::Shield && profile.shields_at_capacity() {
            return Some(PurchaseOutcome::ShieldCapacity);
        }
        let owned_once = matches!(item.kind, StoreItemKind::System | StoreItemKind::Artifact);
        if owned_once && !item.is_infinite && profile.inventory.iter().any(|i| i == item_id) {
            return Some(PurchaseOutcome::AlreadyOwned);
        }

        let outcome = match item.kind {
            StoreItemKind::Shield => {
                profile.add_shield();
                PurchaseOutcome::Purchased
            }
            StoreItemKind::Battery => {
                profile.shields = SHIELD_MAX;
                PurchaseOutcome::Purchased
            }
            StoreItemKind::Redemption => match honor::redeem_profile(profile, today) {
                Redemption::Redeemed { day, .. } => PurchaseOutcome::HonorRestored { day },
                // Abort before charging: a perfect month buys nothing.
                Redemption::AlreadyPerfect => return Some(PurchaseOutcome::HonorAlreadyPerfect),
            },
            StoreItemKind::System
            | StoreItemKind::Artifact
            | StoreItemKind::Voucher
            | StoreItemKind::Potion => {
                profile.inventory.push(item.id.clone());
                PurchaseOutcome::Purchased
            }
        };

        profile.remove_gold(item.cost);
        profile.purchase_history.insert(
            0,
            PurchaseLog {
                id: mint_id(PURCHASE_ID_PREFIX, rng),
                item_id: item.id.clone(),
                title: item.title.clone(),
                cost: item.cost,
                timestamp: now,
            },
        );
        profile.purchase_history.truncate(PURCHASE_LOG_CAP);

        if !item.is_infinite {
            self.items.retain(|i| i.id != item_id);
        }
        Some(outcome)
    }

    /// Insert or update an item by id; duplicate titles are rejected to
    /// keep injected packs from flooding the market.
    pub fn upsert(&mut self, item: StoreItem) {
        if let Some(existing) = self.items.iter_mut().find(|i| i.id == item.id) {
            *existing = item;
            return;
        }
        if self.items.iter().any(|i| i.title == item.title) {
            return;
        }
        self.items.push(item);
    }

    pub fn delete(&mut self, item_id: &str) {
        self.items.retain(|i| i.id != item_id);
    }

    /// Drop items sharing an id, keeping the first occurrence.
    pub fn dedup(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.items.retain(|item| seen.insert(item.id.clone()));
    }
}

/// The built-in market stock.
#[must_use]
pub fn default_stock() -> Vec<StoreItem> {
    vec![
        StoreItem {
            id: String::from("item_shield"),
            title: String::from("Streak Shield"),
            description: String::from("Absorbs one missed day without streak or stat loss."),
            cost: 1_000,
            kind: StoreItemKind::Shield,
            icon: String::from("Shield"),
            is_infinite: true,
        },
        StoreItem {
            id: String::from("item_battery"),
            title: String::from("Shield Battery"),
            description: String::from("Recharges shields to full capacity."),
            cost: 2_500,
            kind: StoreItemKind::Battery,
            icon: String::from("BatteryCharging"),
            is_infinite: true,
        },
        StoreItem {
            id: String::from("item_redemption"),
            title: String::from("Writ of Redemption"),
            description: String::from("Restores your worst honor day this month to 100."),
            cost: 2_000,
            kind: StoreItemKind::Redemption,
            icon: String::from("Scroll"),
            is_infinite: true,
        },
        StoreItem {
            id: String::from("item_focus_sigil"),
            title: String::from("Focus Sigil"),
            description: String::from("A one-time artifact for the collection."),
            cost: 5_000,
            kind: StoreItemKind::Artifact,
            icon: String::from("Gem"),
            is_infinite: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn fixed_now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0)
            .single()
            .expect("valid timestamp")
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
    }

    fn shop() -> ShopState {
        ShopState {
            items: default_stock(),
        }
    }

    #[test]
    fn shield_purchase_respects_capacity() {
        let mut shop = shop();
        let mut profile = Profile::default();
        profile.add_gold(10_000);
        let mut rng = SmallRng::seed_from_u64(1);

        for _ in 0..3 {
            let outcome = shop
                .buy("item_shield", &mut profile, date(2024, 6, 15), fixed_now(), &mut rng)
                .expect("item exists");
            assert_eq!(outcome, PurchaseOutcome::Purchased);
        }
        assert_eq!(profile.shields, 3);

        let outcome = shop
            .buy("item_shield", &mut profile, date(2024, 6, 15), fixed_now(), &mut rng)
            .expect("item exists");
        assert_eq!(outcome, PurchaseOutcome::ShieldCapacity);
        assert_eq!(profile.gold, 10_000 - 3_000);
    }

    #[test]
    fn insufficient_gold_charges_nothing() {
        let mut shop = shop();
        let mut profile = Profile::default();
        profile.add_gold(100);
        let mut rng = SmallRng::seed_from_u64(1);

        let outcome = shop
            .buy("item_shield", &mut profile, date(2024, 6, 15), fixed_now(), &mut rng)
            .expect("item exists");
        assert_eq!(outcome, PurchaseOutcome::InsufficientGold);
        assert_eq!(profile.gold, 100);
        assert!(profile.purchase_history.is_empty());
    }

    #[test]
    fn redemption_restores_worst_day_or_aborts() {
        let mut shop = shop();
        let mut profile = Profile::default();
        profile.add_gold(10_000);
        honor::penalize_profile(&mut profile, date(2024, 6, 10), 30.0);
        let mut rng = SmallRng::seed_from_u64(1);

        let outcome = shop
            .buy("item_redemption", &mut profile, date(2024, 6, 15), fixed_now(), &mut rng)
            .expect("item exists");
        assert_eq!(
            outcome,
            PurchaseOutcome::HonorRestored {
                day: String::from("2024-06-10")
            }
        );
        assert_eq!(profile.gold, 8_000);

        // Second writ finds a perfect month and does not charge.
        let outcome = shop
            .buy("item_redemption", &mut profile, date(2024, 6, 15), fixed_now(), &mut rng)
            .expect("item exists");
        assert_eq!(outcome, PurchaseOutcome::HonorAlreadyPerfect);
        assert_eq!(profile.gold, 8_000);
    }

    #[test]
    fn unique_artifacts_sell_once_and_leave_stock() {
        let mut shop = shop();
        let mut profile = Profile::default();
        profile.add_gold(20_000);
        let mut rng = SmallRng::seed_from_u64(1);

        let outcome = shop
            .buy("item_focus_sigil", &mut profile, date(2024, 6, 15), fixed_now(), &mut rng)
            .expect("item exists");
        assert_eq!(outcome, PurchaseOutcome::Purchased);
        assert!(profile.inventory.contains(&String::from("item_focus_sigil")));
        assert!(shop.find("item_focus_sigil").is_none());
        assert!(shop.buy("item_focus_sigil", &mut profile, date(2024, 6, 15), fixed_now(), &mut rng).is_none());
    }

    #[test]
    fn purchase_log_caps_at_fifty_newest_first() {
        let mut shop = shop();
        let mut profile = Profile::default();
        profile.add_gold(1_000_000);
        let mut rng = SmallRng::seed_from_u64(1);

        for _ in 0..60 {
            // Battery purchases are repeatable and never capacity-gated.
            shop.buy("item_battery", &mut profile, date(2024, 6, 15), fixed_now(), &mut rng);
        }
        assert_eq!(profile.purchase_history.len(), PURCHASE_LOG_CAP);
    }

    #[test]
    fn upsert_updates_by_id_and_rejects_title_clones() {
        let mut shop = ShopState::default();
        let mut item = default_stock().remove(0);
        shop.upsert(item.clone());
        assert_eq!(shop.items.len(), 1);

        item.cost = 1_500;
        shop.upsert(item.clone());
        assert_eq!(shop.items[0].cost, 1_500);

        item.id = String::from("item_other");
        shop.upsert(item);
        assert_eq!(shop.items.len(), 1, "duplicate title must be rejected");
    }
}
