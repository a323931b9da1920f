//! Conversation state machine integration tests
//!
//! Drives the pure state machine event by event; no runtime involved.

use std::time::Duration;

use crab_voice::conversation::{EMPTY_REPLY_GUARD, MachineSettings};
use crab_voice::intent::FALLBACK_REPLY;
use crab_voice::voice::{SpeechOutcome, Utterance};
use crab_voice::{Command, DispatchOutcome, Event, Phase, StateMachine, WakeWordDetector};

fn machine() -> StateMachine {
    let detector = WakeWordDetector::for_agent("crab", "hey crab").unwrap();
    StateMachine::new(detector, MachineSettings::default())
}

fn heard(text: &str) -> Event {
    Event::Transcript(Utterance::new(text, 0, true))
}

fn partial(text: &str) -> Event {
    Event::Transcript(Utterance::new(text, 0, false))
}

fn dispatched(commands: &[Command]) -> Option<(u64, String)> {
    commands.iter().find_map(|c| match c {
        Command::Dispatch { turn, text } => Some((*turn, text.clone())),
        _ => None,
    })
}

fn spoken(commands: &[Command]) -> Option<(u64, String)> {
    commands.iter().find_map(|c| match c {
        Command::Speak { turn, text } => Some((*turn, text.clone())),
        _ => None,
    })
}

fn debounce_generation(commands: &[Command]) -> Option<u64> {
    commands.iter().find_map(|c| match c {
        Command::ArmDebounce { generation, .. } => Some(*generation),
        _ => None,
    })
}

fn starts_listening(commands: &[Command]) -> bool {
    commands
        .iter()
        .any(|c| matches!(c, Command::StartListening { continuous: true }))
}

/// Wake and play out the greeting; returns the machine in `Open`
fn opened() -> StateMachine {
    let mut sm = machine();
    sm.handle(Event::Activate);
    let commands = sm.handle(heard("hey crab"));
    let (turn, _) = spoken(&commands).unwrap();
    sm.handle(Event::SpeechFinished {
        turn,
        outcome: SpeechOutcome::Finished,
    });
    sm.handle(Event::CooldownElapsed { turn });
    assert_eq!(sm.phase(), Phase::Open);
    sm
}

/// Feed `text` while open and let its debounce fire
fn commit(sm: &mut StateMachine, text: &str) -> Vec<Command> {
    let commands = sm.handle(heard(text));
    match debounce_generation(&commands) {
        Some(generation) => sm.handle(Event::DebounceElapsed { generation }),
        None => Vec::new(),
    }
}

/// Complete the current turn's reply and cooldown
fn finish_reply(sm: &mut StateMachine, turn: u64) {
    sm.handle(Event::SpeechFinished {
        turn,
        outcome: SpeechOutcome::Finished,
    });
    sm.handle(Event::CooldownElapsed { turn });
}

#[test]
fn test_wake_word_containment() {
    for text in ["hey crab", "HEY CRAB what time is it", "ok so hey crab", "crab?"] {
        let mut sm = machine();
        sm.handle(Event::Activate);
        sm.handle(heard(text));
        assert_eq!(sm.phase(), Phase::Speaking, "{text:?} should wake");
        assert!(sm.state().is_assistant_open());
    }

    for text in ["hey there", "crane", "", "  "] {
        let mut sm = machine();
        sm.handle(Event::Activate);
        sm.handle(heard(text));
        assert_eq!(sm.phase(), Phase::AwaitingWake, "{text:?} should not wake");
    }
}

#[test]
fn test_greeting_scenario() {
    let mut sm = machine();
    sm.handle(Event::Activate);

    let commands = sm.handle(heard("hey crab what time is it"));
    assert!(commands.contains(&Command::StopListening));
    let (turn, greeting) = spoken(&commands).unwrap();
    assert_eq!(greeting, "Hi");
    assert!(sm.state().last_committed.is_empty());

    let commands = sm.handle(Event::SpeechFinished {
        turn,
        outcome: SpeechOutcome::Finished,
    });
    assert!(starts_listening(&commands));
    assert_eq!(sm.state().last_spoken_reply, "Hi");
    assert_eq!(sm.phase(), Phase::Cooldown);
    assert!(commands.contains(&Command::ArmCooldown {
        turn,
        after: Duration::from_millis(600)
    }));

    sm.handle(Event::CooldownElapsed { turn });
    assert_eq!(sm.phase(), Phase::Open);
}

#[test]
fn test_commit_stops_listening_before_dispatch() {
    let mut sm = opened();
    let commands = commit(&mut sm, "What is the weather like");

    let stop = commands.iter().position(|c| *c == Command::StopListening);
    let dispatch = commands
        .iter()
        .position(|c| matches!(c, Command::Dispatch { .. }));
    assert!(stop.unwrap() < dispatch.unwrap());
    assert_eq!(dispatched(&commands).unwrap().1, "what is the weather like");
    assert_eq!(sm.phase(), Phase::Processing);
    assert_eq!(sm.state().last_committed, "what is the weather like");
}

#[test]
fn test_interim_results_rearm_debounce() {
    let mut sm = opened();

    let first = debounce_generation(&sm.handle(partial("set a"))).unwrap();
    let second = debounce_generation(&sm.handle(partial("set a timer"))).unwrap();
    assert!(second > first);

    assert!(sm.handle(Event::DebounceElapsed { generation: first }).is_empty());
    assert_eq!(sm.phase(), Phase::Open);

    let commands = sm.handle(Event::DebounceElapsed { generation: second });
    assert_eq!(dispatched(&commands).unwrap().1, "set a timer");
}

#[test]
fn test_no_duplicate_dispatch() {
    let mut sm = opened();

    let commands = commit(&mut sm, "tell me a joke");
    let (turn, _) = dispatched(&commands).unwrap();
    sm.handle(Event::DispatchCompleted {
        turn,
        outcome: DispatchOutcome::conversational("tell me a joke", "Why did the crab cross the road?"),
    });
    finish_reply(&mut sm, turn);
    assert_eq!(sm.phase(), Phase::Open);

    // the recognizer re-emits the same words after reopening
    let commands = commit(&mut sm, "Tell me a joke");
    assert!(dispatched(&commands).is_none());
    assert_eq!(sm.phase(), Phase::Open);
}

#[test]
fn test_echo_is_reset_not_dispatched() {
    let mut sm = opened();
    let commands = commit(&mut sm, "set a reminder");
    let (turn, _) = dispatched(&commands).unwrap();
    sm.handle(Event::DispatchCompleted {
        turn,
        outcome: DispatchOutcome::say("I have set a reminder for nine a m"),
    });
    finish_reply(&mut sm, turn);

    let commands = commit(&mut sm, "reminder for nine a m");
    assert_eq!(commands, vec![Command::ResetTranscript]);
    assert_eq!(sm.phase(), Phase::Open);

    let commands = commit(&mut sm, "what's the weather");
    assert!(dispatched(&commands).is_some());
}

#[test]
fn test_turn_serialization() {
    let mut sm = opened();
    let commands = commit(&mut sm, "first question");
    let (turn, _) = dispatched(&commands).unwrap();

    // processing: new speech cannot start a second turn
    assert!(sm.handle(heard("second question")).is_empty());
    assert!(sm.handle(Event::DebounceElapsed { generation: 99 }).is_empty());
    assert_eq!(sm.phase(), Phase::Processing);

    sm.handle(Event::DispatchCompleted {
        turn,
        outcome: DispatchOutcome::say("An answer."),
    });
    assert_eq!(sm.phase(), Phase::Speaking);

    // speaking: same
    assert!(sm.handle(heard("third question")).is_empty());
    assert_eq!(sm.phase(), Phase::Speaking);
}

#[test]
fn test_always_terminates_a_turn() {
    let outcomes = [
        DispatchOutcome::say("Reminder set."),
        DispatchOutcome::say(FALLBACK_REPLY),
        DispatchOutcome::conversational("question", "An answer."),
        DispatchOutcome::conversational("question", ""),
    ];

    for outcome in outcomes {
        let mut sm = opened();
        let (turn, _) = dispatched(&commit(&mut sm, "question")).unwrap();

        let commands = sm.handle(Event::DispatchCompleted { turn, outcome });
        let speaks: Vec<_> = commands
            .iter()
            .filter(|c| matches!(c, Command::Speak { .. }))
            .collect();
        assert_eq!(speaks.len(), 1);
        let (_, text) = spoken(&commands).unwrap();
        assert!(!text.trim().is_empty());
        assert_eq!(sm.phase(), Phase::Speaking);
    }
}

#[test]
fn test_empty_reply_guard_text() {
    let mut sm = opened();
    let (turn, _) = dispatched(&commit(&mut sm, "do it")).unwrap();
    let commands = sm.handle(Event::DispatchCompleted {
        turn,
        outcome: DispatchOutcome::say(""),
    });
    assert_eq!(spoken(&commands).unwrap().1, EMPTY_REPLY_GUARD);
}

#[test]
fn test_stop_closes_cleanly() {
    let mut sm = opened();
    let (turn, _) = dispatched(&commit(&mut sm, "stop listening")).unwrap();

    let commands = sm.handle(Event::DispatchCompleted {
        turn,
        outcome: DispatchOutcome::close(),
    });

    assert_eq!(sm.phase(), Phase::AwaitingWake);
    assert!(spoken(&commands).is_none());
    assert!(starts_listening(&commands));
    assert!(commands.contains(&Command::CancelSpeech));

    let state = sm.state();
    assert!(state.transcript.is_empty());
    assert!(state.last_committed.is_empty());
    assert!(state.last_spoken_reply.is_empty());
}

#[test]
fn test_stale_dispatch_after_close_is_dropped() {
    let mut sm = opened();
    let (turn, _) = dispatched(&commit(&mut sm, "slow question")).unwrap();

    sm.handle(Event::CloseRequested);
    assert_eq!(sm.phase(), Phase::AwaitingWake);
    assert!(!sm.accepts_dispatch(turn));

    let commands = sm.handle(Event::DispatchCompleted {
        turn,
        outcome: DispatchOutcome::say("Too late."),
    });
    assert!(commands.is_empty());
    assert_eq!(sm.phase(), Phase::AwaitingWake);

    // a late speech completion is dropped too
    assert!(sm
        .handle(Event::SpeechFinished {
            turn,
            outcome: SpeechOutcome::Cancelled,
        })
        .is_empty());
}

#[test]
fn test_reopen_after_close_ignores_old_cooldown() {
    let mut sm = machine();
    sm.handle(Event::Activate);
    let (turn, _) = spoken(&sm.handle(heard("crab"))).unwrap();
    sm.handle(Event::SpeechFinished {
        turn,
        outcome: SpeechOutcome::Finished,
    });
    sm.handle(Event::CloseRequested);

    let (new_turn, _) = spoken(&sm.handle(heard("crab"))).unwrap();
    assert_ne!(turn, new_turn);

    assert!(sm.handle(Event::CooldownElapsed { turn }).is_empty());
    assert_eq!(sm.phase(), Phase::Speaking);
}

#[test]
fn test_close_while_dormant_is_noop() {
    let mut sm = machine();
    assert!(sm.handle(Event::CloseRequested).is_empty());
    assert_eq!(sm.phase(), Phase::Dormant);
}

#[test]
fn test_dictation_forwards_and_suppresses_wake() {
    let mut sm = opened();

    let commands = sm.handle(Event::EnterDictation);
    assert_eq!(sm.phase(), Phase::Dictation);
    assert!(starts_listening(&commands));
    assert!(!sm.state().is_assistant_open());

    assert!(sm.handle(partial("hey crab")).is_empty());
    let commands = sm.handle(heard("hey crab buy milk"));
    assert_eq!(
        commands,
        vec![
            Command::Dictate("hey crab buy milk".into()),
            Command::ResetTranscript
        ]
    );
    assert_eq!(sm.phase(), Phase::Dictation);

    let commands = sm.handle(Event::ExitDictation);
    assert_eq!(sm.phase(), Phase::AwaitingWake);
    assert!(commands.contains(&Command::StopListening));
    assert!(starts_listening(&commands));
}

#[test]
fn test_permission_denied_blocks_until_activate() {
    let mut sm = opened();

    let commands = sm.handle(Event::PermissionDenied);
    assert_eq!(sm.phase(), Phase::AwaitingWake);
    assert!(sm.state().listening_blocked);
    assert!(!starts_listening(&commands));

    // closing or dictating must not restart a blocked recognizer
    assert!(!starts_listening(&sm.handle(Event::CloseRequested)));
    assert!(!starts_listening(&sm.handle(Event::EnterDictation)));
    assert!(!starts_listening(&sm.handle(Event::ExitDictation)));

    let commands = sm.handle(Event::Activate);
    assert!(!sm.state().listening_blocked);
    assert!(starts_listening(&commands));
}

#[test]
fn test_speech_outcome_does_not_matter() {
    for outcome in [
        SpeechOutcome::Finished,
        SpeechOutcome::Failed,
        SpeechOutcome::Cancelled,
        SpeechOutcome::Unavailable,
    ] {
        let mut sm = machine();
        sm.handle(Event::Activate);
        let (turn, _) = spoken(&sm.handle(heard("crab"))).unwrap();
        let commands = sm.handle(Event::SpeechFinished { turn, outcome });
        assert_eq!(sm.phase(), Phase::Cooldown);
        assert!(starts_listening(&commands));
    }
}
