use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use timelapser_core::Bot;
use timelapser_core::agent::{AgentApi, AgentEvent, ApiFuture, FrameRenderer, Viewport};
use timelapser_core::capture::{CaptureScheduler, CaptureSettings, CaptureState};
use timelapser_core::world::{Entity, EntityKind, Pose, Vec3, WorldSnapshot};

struct FakeAgent {
    name: String,
    sent: Mutex<Vec<String>>,
    looks: Mutex<Vec<(f64, f64)>>,
    look_ats: Mutex<Vec<Vec3>>,
    world: Mutex<WorldSnapshot>,
    chat_down: AtomicBool,
}

impl FakeAgent {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            name: "Timelapser".to_string(),
            sent: Mutex::new(Vec::new()),
            looks: Mutex::new(Vec::new()),
            look_ats: Mutex::new(Vec::new()),
            world: Mutex::new(WorldSnapshot::default()),
            chat_down: AtomicBool::new(false),
        })
    }

    fn with_world(world: WorldSnapshot) -> Arc<Self> {
        let agent = Self::new();
        *agent.world.lock().unwrap() = world;
        agent
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    fn said_to(&self, target: &str, text: &str) -> bool {
        let line = format!(r#"/tellraw {target} ["[Timelapser] ","{text}"]"#);
        self.sent().contains(&line)
    }

    fn any_line_contains(&self, needle: &str) -> bool {
        self.sent().iter().any(|l| l.contains(needle))
    }
}

impl AgentApi for FakeAgent {
    fn username(&self) -> &str {
        &self.name
    }

    fn chat<'a>(&'a self, text: String) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            if self.chat_down.load(Ordering::SeqCst) {
                anyhow::bail!("chat dropped");
            }
            self.sent.lock().unwrap().push(text);
            Ok(())
        })
    }

    fn look<'a>(&'a self, yaw: f64, pitch: f64) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.looks.lock().unwrap().push((yaw, pitch));
            Ok(())
        })
    }

    fn look_at<'a>(&'a self, target: Vec3) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.look_ats.lock().unwrap().push(target);
            Ok(())
        })
    }

    fn world_snapshot<'a>(&'a self) -> ApiFuture<'a, WorldSnapshot> {
        Box::pin(async move { Ok(self.world.lock().unwrap().clone()) })
    }
}

#[derive(Default)]
struct FakeRenderer {
    poses: Mutex<Vec<Pose>>,
}

impl FrameRenderer for FakeRenderer {
    fn render<'a>(&'a self, pose: Pose, _viewport: Viewport) -> ApiFuture<'a, Vec<u8>> {
        Box::pin(async move {
            self.poses.lock().unwrap().push(pose);
            Ok(b"\x89PNG\r\n\x1a\nframe".to_vec())
        })
    }
}

fn bot(
    agent: &Arc<FakeAgent>,
    renderer: &Arc<FakeRenderer>,
    dir: &Path,
    frame_limit: Option<u64>,
) -> Bot {
    let settings = CaptureSettings {
        output_dir: dir.to_path_buf(),
        interval: Duration::from_secs(10),
        frame_limit,
        viewport: Viewport::default(),
    };
    Bot::new(agent.clone(), CaptureScheduler::new(settings, renderer.clone())).unwrap()
}

fn entity(kind: EntityKind, name: &str, pose: Pose) -> Entity {
    Entity {
        kind,
        name: name.to_string(),
        position: Some(pose.position),
        yaw: Some(pose.yaw),
        pitch: Some(pose.pitch),
    }
}

fn spawn_pose() -> Pose {
    Pose::new(Vec3::new(0.5, 70.0, 0.5), 0.0, 0.0)
}

#[tokio::test]
async fn start_command_enters_recording_at_frame_zero() {
    let dir = tempfile::tempdir().unwrap();
    let agent = FakeAgent::new();
    let mut bot = bot(&agent, &Arc::default(), dir.path(), None);

    bot.handle_chat("Steve", "!timelapser start").await;

    assert_eq!(bot.capture().state(), CaptureState::Recording);
    assert_eq!(bot.capture().frame_index(), 0);
    assert!(agent.said_to("Steve", "Start recording..."));
}

#[tokio::test]
async fn start_twice_keeps_the_running_recording() {
    let dir = tempfile::tempdir().unwrap();
    let agent = FakeAgent::new();
    let mut bot = bot(&agent, &Arc::default(), dir.path(), None);

    bot.handle_chat("Steve", "!tl start").await;
    bot.handle_chat("Alex", "!tl startRecording").await;

    assert!(bot.capture().is_recording());
    assert!(agent.said_to("Alex", "Already recording."));
}

#[tokio::test]
async fn stop_sends_the_completion_message() {
    let dir = tempfile::tempdir().unwrap();
    let agent = FakeAgent::new();
    let mut bot = bot(&agent, &Arc::default(), dir.path(), None);

    bot.handle_chat("Steve", "!tl start").await;
    bot.handle_chat("Alex", "!tl stop").await;

    assert_eq!(bot.capture().state(), CaptureState::Idle);
    assert!(agent.said_to("Alex", "Stop recording..."));
    // The completion notice goes to whoever started the recording.
    assert!(agent.said_to("Steve", "Finished Recording!"));

    bot.handle_chat("Alex", "!tl stop").await;
    assert!(agent.said_to("Alex", "Not recording."));
}

#[tokio::test]
async fn help_with_a_target_describes_only_that_command() {
    let dir = tempfile::tempdir().unwrap();
    let agent = FakeAgent::new();
    let mut bot = bot(&agent, &Arc::default(), dir.path(), None);

    bot.handle_chat("Steve", "!tl help setCamera").await;

    let sent = agent.sent();
    assert_eq!(sent.len(), 3);
    assert!(sent[0].contains("setCamera(camera) <type> <target>:"));
    assert!(sent[0].contains(r#""suggest_command""#));
    assert!(!sent.iter().any(|l| l.contains("unsetCamera")));
}

#[tokio::test]
async fn help_without_a_target_lists_every_command() {
    let dir = tempfile::tempdir().unwrap();
    let agent = FakeAgent::new();
    let mut bot = bot(&agent, &Arc::default(), dir.path(), None);

    bot.handle_chat("Steve", "!tl help").await;

    let entries = bot.router().registry().describe(None).unwrap().len();
    assert_eq!(entries, 6);
    assert_eq!(agent.sent().len(), 3 * entries);
    assert!(agent.any_line_contains("lookAt(see) <type> <target>:"));
}

#[tokio::test]
async fn unknown_names_are_reported_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let agent = FakeAgent::new();
    let mut bot = bot(&agent, &Arc::default(), dir.path(), None);

    bot.handle_chat("Steve", "!tl fly").await;
    bot.handle_chat("Steve", "!tl help fly").await;

    let line = r#"/tellraw Steve ["[Timelapser] ","Command not found: fly"]"#;
    assert_eq!(agent.sent(), vec![line.to_string(), line.to_string()]);
}

#[tokio::test]
async fn ordinary_chat_and_own_messages_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let agent = FakeAgent::new();
    let mut bot = bot(&agent, &Arc::default(), dir.path(), None);

    bot.handle_chat("Steve", "nice build!").await;
    bot.handle_chat("Steve", "!tl").await;
    bot.handle_chat("Steve", "!TL start").await;
    bot.handle_chat("Timelapser", "!tl start").await;

    assert!(agent.sent().is_empty());
    assert!(!bot.capture().is_recording());
}

#[tokio::test]
async fn set_camera_accepts_irregular_spacing() {
    let dir = tempfile::tempdir().unwrap();
    let agent = FakeAgent::new();
    let mut bot = bot(&agent, &Arc::default(), dir.path(), None);

    bot.handle_chat("Steve", "!tl  setCamera   abs   0,64,0/0,0").await;

    assert_eq!(
        bot.camera().override_pose(),
        Some(Pose::new(Vec3::new(0.0, 64.0, 0.0), 0.0, 0.0))
    );
    assert!(agent.said_to("Steve", "Setting camera position to 0,64,0/0,0..."));
    assert!(agent.said_to(
        "Steve",
        "Set camera position at (0, 64, 0) facing (0 / 0)."
    ));

    bot.handle_chat("Steve", "!tl -camera").await;
    assert_eq!(bot.camera().override_pose(), None);
    assert!(agent.said_to("Steve", "Unsetting camera position..."));
}

#[tokio::test]
async fn set_camera_without_rotation_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let agent = FakeAgent::new();
    let mut bot = bot(&agent, &Arc::default(), dir.path(), None);

    bot.handle_chat("Steve", "!tl camera abs 0,64,0").await;

    assert_eq!(bot.camera().override_pose(), None);
    assert!(agent.any_line_contains("Failed to set camera position! (abs, 0,64,0)"));
}

#[tokio::test]
async fn set_camera_on_a_missing_mob_reports_the_target() {
    let dir = tempfile::tempdir().unwrap();
    let agent = FakeAgent::new();
    let mut bot = bot(&agent, &Arc::default(), dir.path(), None);

    bot.handle_chat("Steve", "!tl setCamera mob zombie").await;

    assert_eq!(bot.camera().override_pose(), None);
    assert!(agent.any_line_contains("Failed to set camera position! (mob, zombie)"));
    assert!(agent.any_line_contains("no mob found matching 'zombie'"));
}

#[tokio::test]
async fn set_camera_copies_an_entity_pose_including_zero_rotation() {
    let dir = tempfile::tempdir().unwrap();
    let zombie = Pose::new(Vec3::new(12.0, 65.0, -3.0), 0.0, 0.0);
    let agent = FakeAgent::with_world(WorldSnapshot {
        self_position: Some(Vec3::new(0.0, 64.0, 0.0)),
        entities: vec![entity(EntityKind::Mob, "Zombie", zombie)],
    });
    let mut bot = bot(&agent, &Arc::default(), dir.path(), None);

    bot.handle_chat("Steve", "!tl camera mob zombie").await;

    assert_eq!(bot.camera().override_pose(), Some(zombie));
}

#[tokio::test]
async fn set_player_defaults_to_the_invoker() {
    let dir = tempfile::tempdir().unwrap();
    let steve = Pose::new(Vec3::new(10.0, 70.0, -5.0), 1.5, -0.25);
    let agent = FakeAgent::with_world(WorldSnapshot {
        self_position: Some(Vec3::new(0.0, 64.0, 0.0)),
        entities: vec![
            entity(EntityKind::Player, "Alex", Pose::new(Vec3::new(1.0, 64.0, 1.0), 0.0, 0.0)),
            entity(EntityKind::Player, "Steve", steve),
        ],
    });
    let mut bot = bot(&agent, &Arc::default(), dir.path(), None);

    bot.handle_chat("Steve", "!tl setPlayer").await;

    assert!(agent.sent().contains(&"/tp Timelapser 10 70 -5".to_string()));
    assert_eq!(*agent.looks.lock().unwrap(), vec![(1.5, -0.25)]);
    assert!(agent.said_to("Steve", "Setting bot position to Steve..."));
    assert!(agent.said_to(
        "Steve",
        "Set player position at (10, 70, -5) facing (1.5 / -0.25)."
    ));
}

#[tokio::test]
async fn look_at_turns_towards_the_target_position() {
    let dir = tempfile::tempdir().unwrap();
    let agent = FakeAgent::new();
    let mut bot = bot(&agent, &Arc::default(), dir.path(), None);

    bot.handle_chat("Steve", "!tl see abs 1,2,3").await;
    bot.handle_chat("Steve", "!tl lookAt mob creeper").await;

    assert_eq!(*agent.look_ats.lock().unwrap(), vec![Vec3::new(1.0, 2.0, 3.0)]);
    assert!(agent.said_to("Steve", "Now looking at (1, 2, 3)"));
    assert!(agent.any_line_contains("Failed to look at target! (creeper)"));
}

#[tokio::test]
async fn bad_target_type_is_a_parse_error_reply() {
    let dir = tempfile::tempdir().unwrap();
    let agent = FakeAgent::new();
    let mut bot = bot(&agent, &Arc::default(), dir.path(), None);

    bot.handle_chat("Steve", "!tl camera villager bob").await;

    assert!(agent.any_line_contains("invalid input: unknown target type 'villager'"));
}

#[tokio::test]
async fn spawn_greets_everyone_and_tracks_the_pose() {
    let dir = tempfile::tempdir().unwrap();
    let agent = FakeAgent::new();
    let mut bot = bot(&agent, &Arc::default(), dir.path(), None);

    let end = bot
        .handle_event(AgentEvent::Spawned { pose: spawn_pose() })
        .await;

    assert!(end.is_none());
    assert_eq!(bot.live_pose(), Some(spawn_pose()));
    assert!(agent.said_to("@a", "Hello, world!"));
    assert!(agent.any_line_contains("!timelapser help"));
    assert!(agent.any_line_contains("!tl help"));
}

#[tokio::test(start_paused = true)]
async fn recording_auto_stops_after_the_frame_limit() {
    let dir = tempfile::tempdir().unwrap();
    let agent = FakeAgent::new();
    let renderer = Arc::new(FakeRenderer::default());
    let mut bot = bot(&agent, &renderer, dir.path(), Some(1));

    let (tx, mut rx) = mpsc::channel(16);
    tx.send(AgentEvent::Spawned { pose: spawn_pose() }).await.unwrap();
    tx.send(AgentEvent::Chat {
        username: "Steve".to_string(),
        message: "!tl start".to_string(),
    })
    .await
    .unwrap();

    // The session stays open, so run only returns through the timeout.
    let outcome = tokio::time::timeout(Duration::from_secs(60), bot.run(&mut rx)).await;
    assert!(outcome.is_err());

    assert_eq!(bot.capture().state(), CaptureState::Idle);
    assert_eq!(bot.capture().frame_index(), 2);
    assert!(agent.said_to("Steve", "Finished Recording!"));

    bot.shutdown().await;
    assert_eq!(*renderer.poses.lock().unwrap(), vec![spawn_pose(), spawn_pose()]);
    drop(tx);
}

#[tokio::test(start_paused = true)]
async fn ticks_render_from_the_camera_override() {
    let dir = tempfile::tempdir().unwrap();
    let agent = FakeAgent::new();
    let renderer = Arc::new(FakeRenderer::default());
    let mut bot = bot(&agent, &renderer, dir.path(), None);

    bot.handle_event(AgentEvent::Spawned { pose: spawn_pose() })
        .await;
    bot.handle_chat("Steve", "!tl camera abs 5,80,5/1,0.5").await;
    bot.handle_chat("Steve", "!tl start").await;
    bot.tick().await;
    bot.handle_chat("Steve", "!tl unsetCamera").await;
    bot.tick().await;
    bot.shutdown().await;

    let rendered = renderer.poses.lock().unwrap().clone();
    assert_eq!(rendered.len(), 2);
    assert!(rendered.contains(&Pose::new(Vec3::new(5.0, 80.0, 5.0), 1.0, 0.5)));
    assert!(rendered.contains(&spawn_pose()));
}

#[tokio::test(start_paused = true)]
async fn session_end_stops_recording_without_resuming() {
    let dir = tempfile::tempdir().unwrap();
    let agent = FakeAgent::new();
    let renderer: Arc<FakeRenderer> = Arc::default();
    let mut bot = bot(&agent, &renderer, dir.path(), None);

    bot.handle_chat("Steve", "!tl camera abs 0,64,0/0,0").await;
    bot.handle_chat("Steve", "!tl start").await;
    let end = bot
        .handle_event(AgentEvent::Ended {
            reason: "kicked".to_string(),
        })
        .await;

    assert_eq!(end.map(|e| e.reason), Some("kicked".to_string()));
    assert!(!bot.capture().is_recording());
    // No chat channel once the session is gone.
    assert!(!agent.said_to("Steve", "Finished Recording!"));

    let fresh = FakeAgent::new();
    bot.reattach(fresh.clone(), renderer.clone());
    assert!(!bot.capture().is_recording());
    assert!(bot.camera().override_pose().is_some());
    assert_eq!(bot.live_pose(), None);
    assert!(fresh.sent().is_empty());
}

#[tokio::test]
async fn commands_take_effect_when_feedback_cannot_be_sent() {
    let dir = tempfile::tempdir().unwrap();
    let agent = FakeAgent::new();
    let mut bot = bot(&agent, &Arc::default(), dir.path(), None);

    bot.handle_chat("Steve", "!tl start").await;
    bot.handle_chat("Steve", "!tl camera abs 1,64,1/90,0").await;
    assert!(bot.capture().is_recording());
    assert!(bot.camera().override_pose().is_some());

    agent.chat_down.store(true, Ordering::SeqCst);

    bot.handle_chat("Steve", "!tl stop").await;
    assert_eq!(bot.capture().state(), CaptureState::Idle);

    bot.handle_chat("Steve", "!tl -camera").await;
    assert!(bot.camera().override_pose().is_none());

    bot.handle_chat("Steve", "!tl setCamera abs 5,70,5/180,10").await;
    assert_eq!(
        bot.camera().override_pose(),
        Some(Pose::new(Vec3::new(5.0, 70.0, 5.0), 180.0, 10.0))
    );
}
