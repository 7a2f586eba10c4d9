mod common;

use std::sync::Arc;

use bee_headless::{
	controller::{Autopilot, Phase, Timing},
	page::Shortcut,
	policy::Policy,
	resolver::Resolution,
	state::{LEARN_KEY, RUN_KEY, RunState, TARGET_KEY},
	store::{ANSWERS_KEY, AnswerStore, FileStore, MemoryStore, StateStore},
};
use common::{FakePage, RecordingClock, View, capitals};

type Pilot<S = MemoryStore> = Autopilot<FakePage, S, RecordingClock>;

fn pilot<S: StateStore>(page: FakePage, storage: S) -> Pilot<S> {
	Autopilot::new(page, storage, RecordingClock::default(), Arc::new(Policy::default()), Timing::default())
}

/// Storage as left by an earlier session
fn seeded(running: bool, answer: Option<&str>) -> MemoryStore {
	let mut storage = MemoryStore::new();
	RunState { running, ..RunState::default() }.save(&mut storage).unwrap();
	if let Some(answer) = answer {
		let mut store = AnswerStore::new();
		store.learn("Reto 7: Capitales", "¿Cuál es la capital de Francia?", answer);
		store.save(&mut storage).unwrap();
	}
	storage
}

#[tokio::test]
async fn persisted_run_flag_resumes_polling() {
	let autopilot = pilot(FakePage::new(capitals(true)), seeded(true, None));
	assert_eq!(autopilot.phase(), Phase::Polling);

	let autopilot = pilot(FakePage::new(capitals(true)), seeded(false, None));
	assert_eq!(autopilot.phase(), Phase::Idle);
}

#[tokio::test]
async fn idle_tick_touches_nothing() {
	let mut autopilot = pilot(FakePage::new(capitals(true)), seeded(false, Some("Paris")));

	autopilot.tick().await.unwrap();

	assert_eq!(autopilot.page().refreshes, 0);
	assert!(autopilot.page().clicks.is_empty());
}

#[tokio::test]
async fn tick_answers_and_advances() {
	let mut page = FakePage::new(capitals(true));
	let done = page.add_view(View::new().title("Reto 7: Capitales").build());
	page.on_click(0, "Siguiente", done);
	let mut autopilot = pilot(page, seeded(true, Some("Paris")));

	autopilot.tick().await.unwrap();
	assert_eq!(autopilot.page().clicks, vec!["Paris", "Siguiente"]);

	// the next view has no options
	autopilot.tick().await.unwrap();
	assert_eq!(autopilot.page().clicks.len(), 2);
}

#[tokio::test]
async fn repeated_ticks_on_an_unknown_question_change_nothing() {
	let mut autopilot = pilot(FakePage::new(capitals(true)), seeded(true, None));
	let storage_before = autopilot.storage().clone();
	let state_before = autopilot.state().clone();

	for _ in 0..5 {
		autopilot.tick().await.unwrap();
		autopilot.watch().await.unwrap();
	}

	assert!(autopilot.page().clicks.is_empty());
	assert_eq!(autopilot.storage(), &storage_before);
	assert_eq!(autopilot.state(), &state_before);
}

#[tokio::test]
async fn restart_control_is_clicked_instead_of_answering() {
	let view = View::new()
		.title("Reto 7: Capitales")
		.question("¿Cuál es la capital de Francia?")
		.options(&["Madrid", "Paris", "Rome"])
		.control("Reintentar")
		.build();
	let mut autopilot = pilot(FakePage::new(view), seeded(true, Some("Paris")));

	autopilot.tick().await.unwrap();

	assert_eq!(autopilot.page().clicks, vec!["Reintentar"]);
	assert_eq!(autopilot.store().len(), 1);
}

#[tokio::test]
async fn learning_then_answering() {
	let mut autopilot = pilot(FakePage::new(capitals(false)), seeded(true, None));
	assert!(autopilot.toggle_learning().unwrap());

	autopilot.tick().await.unwrap();
	assert!(autopilot.status().capturing);
	autopilot.page_mut().operator_picks("Rome");
	autopilot.watch().await.unwrap();

	assert_eq!(autopilot.store().lookup("reto 7: capitales", "¿cuál es la capital de francia?"), Some("Rome"));
	assert!(autopilot.storage().get(ANSWERS_KEY).unwrap().contains("Rome"));
	assert_eq!(autopilot.storage().get(LEARN_KEY).as_deref(), Some("true"));

	autopilot.tick().await.unwrap();
	assert_eq!(autopilot.page().clicks, vec!["Rome"]);
}

#[tokio::test]
async fn shortcuts_toggle_and_force_stop() {
	let mut autopilot = pilot(FakePage::new(capitals(false)), MemoryStore::new());

	autopilot.page_mut().press(Shortcut::ToggleRun);
	autopilot.watch().await.unwrap();
	assert_eq!(autopilot.phase(), Phase::Polling);
	assert_eq!(autopilot.storage().get(RUN_KEY).as_deref(), Some("true"));
	assert_eq!(autopilot.state().target_context.as_deref(), Some("Reto 7: Capitales"));

	autopilot.page_mut().press(Shortcut::ForceStop);
	autopilot.watch().await.unwrap();
	assert_eq!(autopilot.phase(), Phase::Idle);
	assert_eq!(autopilot.storage().get(RUN_KEY).as_deref(), Some("false"));

	// force stop while idle stays idle
	autopilot.page_mut().press(Shortcut::ForceStop);
	autopilot.watch().await.unwrap();
	assert_eq!(autopilot.phase(), Phase::Idle);
}

#[tokio::test]
async fn loop_reopens_the_target_card() {
	let mut page = FakePage::new(capitals(false));
	let overview = page.add_view(
		View::new()
			.card("Reto 6: Ríos", "Abrir reto 6")
			.card("Reto 7: Capitales", "Abrir reto 7")
			.build(),
	);
	page.on_click(overview, "Abrir reto 7", 0);
	let mut autopilot = pilot(page, MemoryStore::new());

	autopilot.start().await.unwrap();
	assert!(autopilot.toggle_looping().await.unwrap());
	assert_eq!(autopilot.storage().get(TARGET_KEY).as_deref(), Some("Reto 7: Capitales"));

	autopilot.page_mut().show(overview);
	autopilot.tick().await.unwrap();

	assert_eq!(autopilot.page().clicks, vec!["Abrir reto 7"]);
	assert_eq!(autopilot.page().current(), 0);
}

#[tokio::test]
async fn loop_enters_the_questions_before_looking_for_cards() {
	let mut page = FakePage::new(capitals(false));
	let intro = page.add_view(View::new().control("Ir a las preguntas").card("Reto 7: Capitales", "Abrir reto 7").build());
	let mut autopilot = pilot(page, MemoryStore::new());
	autopilot.toggle_looping().await.unwrap();
	autopilot.start().await.unwrap();

	autopilot.page_mut().show(intro);
	autopilot.tick().await.unwrap();

	assert_eq!(autopilot.page().clicks, vec!["Ir a las preguntas"]);
}

#[tokio::test]
async fn loop_without_target_leaves_overview_alone() {
	let overview = View::new().card("Reto 7: Capitales", "Abrir reto 7").build();
	let mut autopilot = pilot(FakePage::new(overview), MemoryStore::new());
	autopilot.toggle_looping().await.unwrap();
	autopilot.start().await.unwrap();
	assert_eq!(autopilot.state().target_context, None);

	autopilot.tick().await.unwrap();

	assert!(autopilot.page().clicks.is_empty());
}

#[tokio::test]
async fn solve_now_works_while_idle() {
	let mut autopilot = pilot(FakePage::new(capitals(false)), seeded(false, Some("Madrid")));

	let resolution = autopilot.solve_now().await.unwrap();

	assert_eq!(
		resolution,
		Resolution::Answered {
			option: "Madrid".into(),
			advanced: false
		}
	);
	assert_eq!(autopilot.phase(), Phase::Idle);
}

#[tokio::test]
async fn import_merges_and_rejects_garbage_whole() {
	let mut autopilot = pilot(FakePage::new(capitals(false)), seeded(false, Some("Paris")));

	let written = autopilot
		.import(r#"{"Reto 7: Capitales": {"¿Cuál es la capital de Italia?": "Roma"}, "": {"  Capital of Spain ": "Madrid"}}"#)
		.unwrap();
	assert_eq!(written, 2);
	assert_eq!(autopilot.store().len(), 3);
	assert_eq!(AnswerStore::load(autopilot.storage()), *autopilot.store());

	assert!(autopilot.import("{not json").is_err());
	assert_eq!(autopilot.store().len(), 3);

	autopilot.clear().unwrap();
	assert!(autopilot.store().is_empty());
	assert!(AnswerStore::load(autopilot.storage()).is_empty());
}

#[tokio::test]
async fn back_prefers_the_page_control() {
	let mut autopilot = pilot(FakePage::new(capitals(false)), MemoryStore::new());
	autopilot.go_back().await.unwrap();
	assert_eq!(autopilot.page().history_backs, 1);

	let mut autopilot = pilot(FakePage::new(View::new().title("Reto 7").back_button().build()), MemoryStore::new());
	autopilot.go_back().await.unwrap();
	assert_eq!(autopilot.page().history_backs, 0);
	assert_eq!(autopilot.page().clicks.len(), 1);
}

#[tokio::test]
async fn session_survives_a_restart() {
	let dir = tempfile::tempdir().unwrap();
	let storage = FileStore::for_origin(dir.path(), common::URL);
	let path = storage.path().to_path_buf();

	let mut autopilot = pilot(FakePage::new(capitals(false)), storage);
	autopilot.start().await.unwrap();
	autopilot.toggle_learning().unwrap();
	autopilot.import(r#"{"Reto 7: Capitales": {"¿Cuál es la capital de Francia?": "Paris"}}"#).unwrap();
	drop(autopilot);

	let mut autopilot = pilot(FakePage::new(capitals(false)), FileStore::open(path));
	assert_eq!(autopilot.phase(), Phase::Polling);
	assert!(autopilot.state().learning);
	assert_eq!(autopilot.state().target_context.as_deref(), Some("Reto 7: Capitales"));

	autopilot.tick().await.unwrap();
	assert_eq!(autopilot.page().clicks, vec!["Paris"]);
}
