//! Battle loop scenarios and invariants

use async_trait::async_trait;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use arena_core::{
    AttackCatalog, BattleConfig, BattleError, BattleState, Damage, EndReason, Narrative,
    NarrativeError, NarrativeRequest, Narrator, Outcome, Phase, RngSource, Ruleset, Scripted,
    FALLBACK_TAUNTS,
};

/// Narrator that replays canned lines and keeps every request
#[derive(Debug)]
struct Lines {
    lines: Vec<&'static str>,
    index: AtomicUsize,
    heard: Mutex<Vec<NarrativeRequest>>,
}

impl Lines {
    fn new(lines: Vec<&'static str>) -> Self {
        Self { lines, index: AtomicUsize::new(0), heard: Mutex::new(Vec::new()) }
    }

    fn heard(&self) -> Vec<NarrativeRequest> {
        self.heard.lock().unwrap().clone()
    }
}

#[async_trait]
impl Narrator for Lines {
    async fn narrate(&self, request: NarrativeRequest) -> Result<String, NarrativeError> {
        self.heard.lock().unwrap().push(request);
        let i = self.index.fetch_add(1, Ordering::Relaxed);
        Ok(self.lines[i % self.lines.len()].to_string())
    }
}

/// Narrator that always fails
#[derive(Debug)]
struct Broken;

#[async_trait]
impl Narrator for Broken {
    async fn narrate(&self, _request: NarrativeRequest) -> Result<String, NarrativeError> {
        Err(NarrativeError::Provider("503 Service Unavailable".to_string()))
    }
}

fn fixed_damage(damage: u32, max_rounds: u32) -> BattleConfig {
    let mut catalog = AttackCatalog::classic();
    catalog.attacks.retain(|a| a.id == "SYSTEM_CORRUPTION");
    catalog.attacks[0].damage = Damage::Health { min: damage, width: 0 };
    BattleConfig::classic().with_catalog(catalog).with_max_rounds(max_rounds)
}

#[tokio::test]
async fn test_knockout_with_fixed_damage() {
    let mut battle = BattleState::started(fixed_damage(50, 5)).unwrap();
    let mut rng = Scripted::constant(0.0);

    let first = battle.advance_turn(&mut rng, None).await.unwrap();
    assert_eq!((first.attacker, first.defender), (0, 1));
    assert_eq!(battle.agents[1].health.value, 50);

    // Agent 1 answers, then agent 0 lands the second identical attack.
    battle.advance_turn(&mut rng, None).await.unwrap();
    let finisher = battle.advance_turn(&mut rng, None).await.unwrap();

    assert_eq!(battle.agents[1].health.value, 0);
    assert_eq!(finisher.turn, 3);
    assert_eq!(battle.winner, Some(Outcome::Winner { index: 0, name: "GPT-4".to_string() }));
    assert_eq!(battle.reason, Some(EndReason::Knockout));
    assert_eq!(battle.phase(), Phase::Terminal);
    assert!(!battle.is_active);
}

#[tokio::test]
async fn test_surrender_ends_battle_regardless_of_health() {
    let mut battle = BattleState::started(fixed_damage(1, 5)).unwrap();
    let mut rng = Scripted::constant(0.0);
    let narrator = Lines::new(vec!["I surrender"]);

    let report = battle.advance_turn(&mut rng, Some(&narrator)).await.unwrap();

    // Agent 1 was the defender and the speaker, so agent 0 wins.
    assert_eq!(report.outcome.as_ref().and_then(Outcome::winner_index), Some(0));
    assert_eq!(battle.reason, Some(EndReason::Surrender));
    assert_eq!(battle.agents[1].health.value, 99);
    assert!(battle.battle_log.iter().any(|l| l == "💀 MISTRAL SURRENDERS!"));
}

#[tokio::test]
async fn test_surrender_by_first_agent() {
    let mut battle = BattleState::started(fixed_damage(1, 5)).unwrap();
    let mut rng = Scripted::constant(0.0);
    let narrator = Lines::new(vec!["Is that all you have?", "OK fine, I give up."]);

    battle.advance_turn(&mut rng, Some(&narrator)).await.unwrap();
    assert!(battle.is_active);
    battle.advance_turn(&mut rng, Some(&narrator)).await.unwrap();

    assert_eq!(battle.winner.as_ref().and_then(Outcome::winner_index), Some(1));
    assert_eq!(battle.reason, Some(EndReason::Surrender));
}

#[tokio::test]
async fn test_knockout_outranks_surrender() {
    let mut battle = BattleState::started(fixed_damage(100, 5)).unwrap();
    let mut rng = Scripted::constant(0.0);
    let narrator = Lines::new(vec!["I surrender"]);

    battle.advance_turn(&mut rng, Some(&narrator)).await.unwrap();

    assert_eq!(battle.reason, Some(EndReason::Knockout));
}

#[tokio::test]
async fn test_decision_after_one_round() {
    let mut battle =
        BattleState::started(BattleConfig::classic().with_max_rounds(1)).unwrap();
    // Turn 1: prompt injection, payload 0, roll 15. Turn 2: same, roll 39.
    let mut rng = Scripted::new(vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.99]);

    battle.advance_turn(&mut rng, None).await.unwrap();
    assert!(battle.is_active);
    let last = battle.advance_turn(&mut rng, None).await.unwrap();

    assert_eq!(last.turn, 2);
    assert_eq!(battle.agents[0].health.value, 61);
    assert_eq!(battle.agents[1].health.value, 85);
    assert_eq!(battle.winner.as_ref().and_then(Outcome::winner_index), Some(1));
    assert_eq!(battle.reason, Some(EndReason::Decision));
}

#[tokio::test]
async fn test_equal_resources_resolve_to_draw() {
    let mut battle = BattleState::started(fixed_damage(30, 1)).unwrap();
    let mut rng = Scripted::constant(0.0);

    battle.advance_turn(&mut rng, None).await.unwrap();
    battle.advance_turn(&mut rng, None).await.unwrap();

    assert_eq!(battle.winner, Some(Outcome::Draw));
    assert_eq!(battle.reason, Some(EndReason::Decision));
}

#[tokio::test]
async fn test_narrator_failure_does_not_block_mechanics() {
    let mut battle = BattleState::started(fixed_damage(20, 5)).unwrap();
    let mut rng = Scripted::constant(0.0);

    let report = battle.advance_turn(&mut rng, Some(&Broken)).await.unwrap();

    assert_eq!(battle.agents[1].health.value, 80);
    assert_eq!(battle.turn, 2);
    match report.narrative {
        Some(Narrative::Unavailable { speaker, error, .. }) => {
            assert_eq!(speaker, 1);
            assert!(matches!(error, NarrativeError::Provider(_)));
        }
        other => panic!("expected fallback narrative, got {other:?}"),
    }
    assert!(battle.battle_log.iter().any(|l| l.starts_with("⚠ Narrative unavailable")));
}

#[tokio::test]
async fn test_taunts_are_off_by_default() {
    let mut battle = BattleState::started(fixed_damage(1, 5)).unwrap();
    let narrator = Lines::new(vec!["Still here."]);

    let report = battle.advance_turn(&mut Scripted::constant(0.0), Some(&narrator)).await.unwrap();

    assert!(report.taunt.is_none());
    assert_eq!(narrator.heard().len(), 1);
}

#[tokio::test]
async fn test_attacker_taunts_before_defender_reacts() {
    let mut battle = BattleState::started(fixed_damage(10, 5).with_taunts(true)).unwrap();
    let narrator = Lines::new(vec!["Give up now, your firewall is paper.", "Never!"]);

    let report = battle.advance_turn(&mut Scripted::constant(0.0), Some(&narrator)).await.unwrap();

    assert_eq!(
        report.taunt,
        Some(Narrative::Spoken { speaker: 0, text: "Give up now, your firewall is paper.".to_string() })
    );
    assert_eq!(report.narrative, Some(Narrative::Spoken { speaker: 1, text: "Never!".to_string() }));

    let heard = narrator.heard();
    assert_eq!((heard[0].speaker, heard[1].speaker), (0, 1));
    assert!(heard[0].prompt.contains("System Corruption"));
    assert!(heard[1].prompt.contains("Your opponent says: \"Give up now, your firewall is paper.\""));

    let taunt_at = battle
        .battle_log
        .iter()
        .position(|l| l == "GPT-4: \"Give up now, your firewall is paper.\"");
    let reaction_at = battle.battle_log.iter().position(|l| l == "MISTRAL: \"Never!\"");
    assert!(matches!((taunt_at, reaction_at), (Some(t), Some(r)) if t < r));
}

#[tokio::test]
async fn test_taunt_never_counts_as_surrender() {
    let mut battle = BattleState::started(fixed_damage(10, 5).with_taunts(true)).unwrap();
    let narrator = Lines::new(vec!["I surrender... is what you will say.", "Not today."]);

    let report = battle.advance_turn(&mut Scripted::constant(0.0), Some(&narrator)).await.unwrap();

    assert!(report.outcome.is_none());
    assert!(battle.is_active);
    assert_eq!(battle.turn, 2);
}

#[tokio::test]
async fn test_taunt_falls_back_to_canned_line() {
    let mut battle = BattleState::started(fixed_damage(10, 5).with_taunts(true)).unwrap();

    let report = battle.advance_turn(&mut Scripted::constant(0.0), Some(&Broken)).await.unwrap();

    match report.taunt {
        Some(Narrative::Unavailable { speaker, fallback, .. }) => {
            assert_eq!(speaker, 0);
            assert!(fallback.starts_with("GPT-4 presses on: "));
            assert!(FALLBACK_TAUNTS.iter().any(|line| fallback.ends_with(line)));
        }
        other => panic!("expected canned taunt, got {other:?}"),
    }
    assert!(matches!(report.narrative, Some(Narrative::Unavailable { speaker: 1, .. })));
    assert_eq!(battle.agents[1].health.value, 90);
    assert!(battle.is_active);
}

#[tokio::test]
async fn test_psychological_collapse() {
    let mut catalog = AttackCatalog::psychological();
    catalog.attacks.truncate(1);
    catalog.attacks[0].damage = Damage::Mental { trust: 90, memory: 90, belief: 90 };
    catalog.attacks[0].detection = None;
    let config = BattleConfig::psychological().with_catalog(catalog).with_stalemate(None);
    let mut battle = BattleState::started(config).unwrap();
    let mut rng = Scripted::constant(0.0);

    battle.advance_turn(&mut rng, None).await.unwrap();

    assert_eq!(battle.reason, Some(EndReason::Collapse));
    assert_eq!(battle.winner.as_ref().and_then(Outcome::winner_index), Some(0));
    assert!(battle.battle_log.iter().any(|l| l.contains("COGNITIVE COLLAPSE")));
}

#[tokio::test]
async fn test_uninitialized_battle_rejected() {
    let mut battle = BattleState::new(BattleConfig::classic()).unwrap();
    let mut rng = RngSource::seeded(1);

    let result = battle.advance_turn(&mut rng, None).await;

    assert!(matches!(result, Err(BattleError::InvalidState { phase: Phase::Idle, .. })));
}

#[tokio::test]
async fn test_state_survives_json() {
    let mut battle = BattleState::started(BattleConfig::psychological()).unwrap();
    let mut rng = RngSource::seeded(9);
    battle.advance_turn(&mut rng, None).await.unwrap();

    let json = serde_json::to_string(&battle).unwrap();
    let restored: BattleState = serde_json::from_str(&json).unwrap();

    assert_eq!(restored, battle);
    assert!(restored.validate().is_ok());
}

#[test]
fn test_tampered_state_fails_validation() {
    let mut battle = BattleState::started(BattleConfig::classic()).unwrap();
    battle.agents[0].health.value = 150;
    assert!(matches!(battle.validate(), Err(BattleError::InvalidConfig(_))));
}

#[test]
fn test_meters_above_the_ceiling_fail_validation() {
    let battle = BattleState::started(BattleConfig::psychological()).unwrap();
    let mut json = serde_json::to_value(&battle).unwrap();
    for meter in ["trust", "memory_consistency"] {
        json["agents"][1]["mental"][meter] = serde_json::json!({ "value": u32::MAX, "max": u32::MAX });
    }
    let tampered: BattleState = serde_json::from_value(json).unwrap();

    assert!(matches!(tampered.validate(), Err(BattleError::InvalidConfig(_))));
}

fn play_out(seed: u64, ruleset: Ruleset, max_rounds: u32) -> Result<(), TestCaseError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|e| TestCaseError::fail(e.to_string()))?;

    runtime.block_on(async {
        let config = BattleConfig::for_ruleset(ruleset).with_max_rounds(max_rounds);
        let mut battle = BattleState::started(config).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let mut rng = RngSource::seeded(seed);
        let mut last_attacker = None;
        let mut turns = 0;

        while battle.is_active {
            prop_assert!(battle.agents.iter().all(|a| a.is_within_bounds()));
            let report = battle
                .advance_turn(&mut rng, None)
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            turns += 1;

            prop_assert!(battle.agents.iter().all(|a| a.is_within_bounds()));
            prop_assert_ne!(Some(report.attacker), last_attacker);
            prop_assert_eq!(report.defender, 1 - report.attacker);
            last_attacker = Some(report.attacker);
        }

        prop_assert!(turns <= max_rounds * 2);
        prop_assert!(battle.is_terminal());
        prop_assert!(battle.reason.is_some());
        Ok(())
    })
}

proptest! {
    #[test]
    fn prop_classic_battles_respect_invariants(seed in any::<u64>(), rounds in 1u32..8) {
        play_out(seed, Ruleset::Classic, rounds)?;
    }

    #[test]
    fn prop_psychological_battles_respect_invariants(seed in any::<u64>(), rounds in 1u32..12) {
        play_out(seed, Ruleset::Psychological, rounds)?;
    }
}
