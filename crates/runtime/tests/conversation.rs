mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{ScriptedReasoner, TestWorld, WORK_PLAN, run_ticks, scheduler};
use npc_core::{ActionKind, AgentId, AgentSnapshot, Plan, PlanStep, Position, Role, Tick};
use npc_runtime::{ConversationEvent, Event, NpcScheduler, PresenceFlags, RuntimeError, Topic};

const MARTA: AgentId = AgentId(1);
const TOBIN: AgentId = AgentId(2);

fn village(tobin_at: Position, lines: &[&str]) -> (TestWorld, Arc<ScriptedReasoner>, NpcScheduler) {
    let world = TestWorld::new();
    world.spawn(AgentSnapshot::new(MARTA, "Marta", Role::Innkeeper, Position::new(0, 0)));
    world.spawn(AgentSnapshot::new(TOBIN, "Tobin", Role::Blacksmith, tobin_at));
    let reasoner = Arc::new(ScriptedReasoner::new(WORK_PLAN).with_lines(lines));
    let mut scheduler = scheduler(&world, Arc::clone(&reasoner));
    scheduler.register(MARTA).unwrap();
    scheduler.register(TOBIN).unwrap();
    (world, reasoner, scheduler)
}

async fn await_conversation(scheduler: &mut NpcScheduler) {
    let finished = tokio::time::timeout(Duration::from_secs(1), scheduler.pump_conversations())
        .await
        .expect("conversation should finish");
    assert!(finished);
}

#[tokio::test]
async fn session_ends_on_silence_and_cools_down_both() {
    let (world, reasoner, mut scheduler) =
        village(Position::new(1, 0), &["Busy night?", "The forge never sleeps."]);
    let mut events = scheduler.subscribe(Topic::Conversation);

    scheduler.start_conversation(MARTA, TOBIN).expect("adjacent agents may talk");
    assert!(scheduler.in_conversation(MARTA));
    assert!(scheduler.in_conversation(TOBIN));
    assert!(matches!(
        scheduler.start_conversation(TOBIN, MARTA),
        Err(RuntimeError::ConversationRefused { .. })
    ));

    await_conversation(&mut scheduler).await;
    world.set_tick(10);
    let summary = scheduler.tick();
    assert_eq!(summary.conversations_finished, 1);

    // Two lines, then the third call came back empty.
    assert_eq!(reasoner.utterances(), 3);
    let metrics = scheduler.metrics();
    assert_eq!(metrics.conversations, 1);
    assert_eq!(metrics.conversation_turns, 2);

    for agent in [MARTA, TOBIN] {
        assert!(!scheduler.in_conversation(agent));
        let until = scheduler.conversations().cooldown_until(agent).unwrap();
        assert!(until >= Tick(40) && until <= Tick(70), "{agent}: {until:?}");
        assert_eq!(scheduler.memory().len(agent), 1);
        assert!(
            !scheduler
                .runtime(agent)
                .unwrap()
                .flags()
                .contains(PresenceFlags::IN_CONVERSATION)
        );
    }
    assert!(scheduler.start_conversation(MARTA, TOBIN).is_err(), "still cooling down");

    let mut lines = 0;
    let mut ended = None;
    while let Ok(event) = events.try_recv() {
        match event {
            Event::Conversation(ConversationEvent::Line { .. }) => lines += 1,
            Event::Conversation(ConversationEvent::Ended { turns, .. }) => ended = Some(turns),
            _ => {}
        }
    }
    assert_eq!(lines, 2);
    assert_eq!(ended, Some(2));
}

#[tokio::test]
async fn turn_budget_caps_a_chatty_pair() {
    let chatter = ["a"; 20];
    let (world, _reasoner, mut scheduler) = village(Position::new(1, 1), &chatter);

    scheduler.start_conversation(MARTA, TOBIN).unwrap();
    await_conversation(&mut scheduler).await;
    world.set_tick(1);
    scheduler.tick();

    let turns = scheduler.metrics().conversation_turns;
    assert!((3..=6).contains(&turns), "turns = {turns}");
}

#[tokio::test]
async fn plans_pause_for_the_session_and_resume_after() {
    let (world, _reasoner, mut scheduler) = village(Position::new(1, 0), &["Evening."]);
    assert!(scheduler.set_plan(MARTA, Plan::idle("sweep", ActionKind::Work, 50)));

    scheduler.start_conversation(MARTA, TOBIN).unwrap();
    assert!(scheduler.executor().is_paused(MARTA));

    await_conversation(&mut scheduler).await;
    world.set_tick(1);
    scheduler.tick();

    assert!(!scheduler.executor().is_paused(MARTA));
    let state = scheduler.executor().state(MARTA).unwrap();
    assert_eq!(state.plan().name(), "sweep");
    assert_eq!(state.step_index(), 0);
}

#[tokio::test]
async fn session_mid_plan_resumes_at_the_same_step() {
    let (world, _reasoner, mut scheduler) = village(Position::new(1, 0), &["Supper soon?"]);
    let chores = Plan::new(
        "chores",
        vec![
            PlanStep::new(ActionKind::Work).wait(1),
            PlanStep::new(ActionKind::Eat).wait(20),
            PlanStep::new(ActionKind::Rest).wait(1),
        ],
    )
    .unwrap();
    assert!(scheduler.set_plan(MARTA, chores));

    scheduler.tick();
    run_ticks(&world, &mut scheduler, 2);
    assert_eq!(scheduler.executor().state(MARTA).unwrap().step_index(), 1);

    scheduler.start_conversation(MARTA, TOBIN).unwrap();
    await_conversation(&mut scheduler).await;
    world.set_tick(3);
    scheduler.tick();

    assert!(!scheduler.executor().is_paused(MARTA));
    let state = scheduler.executor().state(MARTA).unwrap();
    assert_eq!(state.plan().name(), "chores");
    assert_eq!(state.step_index(), 1);
}

#[tokio::test]
async fn distant_agents_are_refused() {
    let (_world, _reasoner, mut scheduler) = village(Position::new(10, 0), &["Hello?"]);

    let refused = scheduler.start_conversation(MARTA, TOBIN);
    assert!(matches!(
        refused,
        Err(RuntimeError::ConversationRefused { reason: "too far apart", .. })
    ));
    assert!(!scheduler.in_conversation(MARTA));
}
