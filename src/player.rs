//! Playback control for the movie player page.
//!
//! [`Player`] is a plain state machine: the page feeds it media element
//! events ([`MediaEvent`]) and user intents ([`Intent`]) and applies the
//! [`Command`]s it returns to the real `<video>` element. Time never passes
//! inside the machine; callers hand in the wall clock for rental expiry and a
//! monotonic instant for the controls auto-hide deadline.
//!
//! The page script talks to it through [`PlayerInput`] as JSON, e.g.
//! `{"intent": {"type": "seek", "value": 90}}` or `"tick"`, and gets back a
//! [`PlayerUpdate`].

use crate::model::{LibraryItem, PurchaseType, Quality};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Idle time during playback after which the controls are hidden.
pub const CONTROLS_HIDE_AFTER: Duration = Duration::from_secs(3);

/// How often the page asks for a fresh rental countdown.
pub const COUNTDOWN_INTERVAL: Duration = Duration::from_secs(60);

pub const PLAYBACK_RATES: [f64; 8] = [0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0];

pub const SUBTITLE_TRACKS: [&str; 6] = ["Off", "English", "Spanish", "French", "German", "Japanese"];

const SKIP_SECONDS: f64 = 10.0;
const VOLUME_STEP: f64 = 0.1;
const UNMUTE_VOLUME: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    NotPurchased,
    Expired,
}

/// What the viewer is allowed to do with a title.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Access {
    Granted {
        kind: PurchaseType,
        max_quality: Quality,
        expires_at: Option<DateTime<Utc>>,
    },
    Denied {
        reason: DenyReason,
        /// Kept after expiry so the page can still say what was rented.
        kind: Option<PurchaseType>,
    },
}

impl Access {
    /// Derives access from the viewer's best library grant for a title.
    pub fn from_grant(grant: Option<&LibraryItem>, now: DateTime<Utc>) -> Access {
        match grant {
            None => Access::Denied {
                reason: DenyReason::NotPurchased,
                kind: None,
            },
            Some(item) if item.is_expired(now) => Access::Denied {
                reason: DenyReason::Expired,
                kind: Some(item.kind),
            },
            Some(item) => Access::Granted {
                kind: item.kind,
                max_quality: item.quality,
                expires_at: item.expiry_date,
            },
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, Access::Granted { .. })
    }
}

/// Playback resolutions offered in the settings menu, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "4K")]
    P2160,
}

impl Resolution {
    pub const MENU: [Resolution; 5] = [
        Resolution::P2160,
        Resolution::P1080,
        Resolution::P720,
        Resolution::P480,
        Resolution::P360,
    ];

    /// The highest resolution a purchased tier unlocks.
    pub fn ceiling(quality: Quality) -> Resolution {
        match quality {
            Quality::SD => Resolution::P480,
            Quality::HD => Resolution::P720,
            Quality::FHD => Resolution::P1080,
            Quality::UHD => Resolution::P2160,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Resolution::P2160 => "4K",
            Resolution::P1080 => "1080p",
            Resolution::P720 => "720p",
            Resolution::P480 => "480p",
            Resolution::P360 => "360p",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Resolution::P2160 => "4K Ultra HD (2160p)",
            Resolution::P1080 => "Full HD (1080p)",
            Resolution::P720 => "HD (720p)",
            Resolution::P480 => "SD (480p)",
            Resolution::P360 => "Low (360p)",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackState {
    Loading,
    Paused,
    Playing,
    /// Waiting for data; remembers whether playback should resume afterwards.
    Buffering { resume: bool },
    Ended,
    Error(String),
}

impl PlaybackState {
    pub fn name(&self) -> &'static str {
        match self {
            PlaybackState::Loading => "loading",
            PlaybackState::Paused => "paused",
            PlaybackState::Playing => "playing",
            PlaybackState::Buffering { .. } => "buffering",
            PlaybackState::Ended => "ended",
            PlaybackState::Error(_) => "error",
        }
    }
}

/// Lifecycle events reported by the media element.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MediaEvent {
    MetadataLoaded { duration: f64 },
    TimeUpdate { position: f64 },
    Play,
    Pause,
    Waiting,
    CanPlay,
    Ended,
    Error { message: String },
    FullscreenChanged(bool),
}

/// Outcome of a play request issued through [`Command::Play`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PlayOutcome {
    Started,
    /// A pause or a newer load cut the request short.
    Interrupted,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Intent {
    TogglePlay,
    Seek(f64),
    Skip(f64),
    DragStart,
    DragEnd(f64),
    SetVolume(f64),
    ToggleMute,
    ToggleFullscreen,
    SetPlaybackRate(f64),
    SetQuality(Resolution),
    SetSubtitles(String),
    PointerMoved,
    ToggleSettings,
    ToggleInfo,
    CloseMenus,
}

impl Intent {
    /// Keyboard shortcut for a `KeyboardEvent.code`, relative to the current
    /// volume and rate.
    pub fn from_key(code: &str, player: &Player) -> Option<Intent> {
        let intent = match code {
            "Space" => Intent::TogglePlay,
            "ArrowLeft" => Intent::Skip(-SKIP_SECONDS),
            "ArrowRight" => Intent::Skip(SKIP_SECONDS),
            "ArrowUp" => Intent::SetVolume((player.volume + VOLUME_STEP).min(1.0)),
            "ArrowDown" => Intent::SetVolume((player.volume - VOLUME_STEP).max(0.0)),
            "KeyF" => Intent::ToggleFullscreen,
            "KeyM" => Intent::ToggleMute,
            "KeyI" => Intent::ToggleInfo,
            "Escape" => Intent::CloseMenus,
            "Comma" => Intent::SetPlaybackRate((player.rate - 0.25).max(PLAYBACK_RATES[0])),
            "Period" => Intent::SetPlaybackRate((player.rate + 0.25).min(PLAYBACK_RATES[7])),
            _ => return None,
        };
        Some(intent)
    }
}

/// Instructions for the layer that owns the real media element.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Command {
    Play,
    Pause,
    SeekTo(f64),
    SetVolume(f64),
    SetMuted(bool),
    SetRate(f64),
    EnterFullscreen,
    ExitFullscreen,
    SelectSource(Resolution),
    ShowSubtitles(Option<String>),
}

/// Anything the page can feed into a [`Player`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerInput {
    Event(MediaEvent),
    Intent(Intent),
    /// A `KeyboardEvent.code`; unmapped keys do nothing.
    Key(String),
    PlayOutcome(PlayOutcome),
    /// Re-checks the rental clock and the auto-hide deadline.
    Tick,
}

/// Answer to every [`PlayerInput`]: what to do to the media element and how
/// the controls should look afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerUpdate {
    pub commands: Vec<Command>,
    pub view: PlayerView,
}

pub struct Player {
    access: Access,
    state: PlaybackState,
    position: f64,
    duration: f64,
    volume: f64,
    muted: bool,
    fullscreen: bool,
    rate: f64,
    resolution: Resolution,
    subtitles: String,
    controls_visible: bool,
    hide_at: Option<Instant>,
    settings_open: bool,
    info_open: bool,
    dragging: bool,
    play_pending: bool,
    time_remaining: Option<String>,
}

impl Player {
    /// Creates a player for a title. `duration_hint` is the catalog runtime in
    /// seconds and is replaced once the media element reports metadata.
    pub fn new(access: Access, duration_hint: f64, now: DateTime<Utc>) -> Self {
        let resolution = match access {
            Access::Granted { max_quality, .. } => Resolution::ceiling(max_quality),
            Access::Denied { .. } => Resolution::P2160,
        };
        let mut player = Player {
            access,
            state: PlaybackState::Loading,
            position: 0.0,
            duration: duration_hint.max(0.0),
            volume: 1.0,
            muted: false,
            fullscreen: false,
            rate: 1.0,
            resolution,
            subtitles: SUBTITLE_TRACKS[0].to_owned(),
            controls_visible: true,
            hide_at: None,
            settings_open: false,
            info_open: false,
            dragging: false,
            play_pending: false,
            time_remaining: None,
        };
        player.refresh_countdown(now);
        player
    }

    fn is_playing(&self) -> bool {
        matches!(
            self.state,
            PlaybackState::Playing | PlaybackState::Buffering { resume: true }
        )
    }

    /// Whether `resolution` may be picked under the purchased ceiling.
    pub fn is_selectable(&self, resolution: Resolution) -> bool {
        match self.access {
            Access::Granted { max_quality, .. } => resolution <= Resolution::ceiling(max_quality),
            Access::Denied { .. } => false,
        }
    }

    /// Dispatches one input and reports the resulting commands and view.
    pub fn apply(&mut self, input: PlayerInput, now: DateTime<Utc>, at: Instant) -> PlayerUpdate {
        let commands = match input {
            PlayerInput::Event(event) => {
                self.handle_event(event, at);
                Vec::new()
            }
            PlayerInput::Intent(intent) => self.handle_intent(intent, at),
            PlayerInput::Key(code) => match Intent::from_key(&code, self) {
                Some(intent) => self.handle_intent(intent, at),
                None => Vec::new(),
            },
            PlayerInput::PlayOutcome(outcome) => {
                self.play_outcome(outcome);
                Vec::new()
            }
            PlayerInput::Tick => self.tick(now, at),
        };
        PlayerUpdate {
            commands,
            view: self.view(),
        }
    }

    pub fn handle_event(&mut self, event: MediaEvent, at: Instant) {
        if !self.access.is_granted() {
            return;
        }
        match event {
            MediaEvent::MetadataLoaded { duration } => {
                self.duration = duration.max(0.0);
                if self.state == PlaybackState::Loading {
                    self.state = PlaybackState::Paused;
                }
            }
            MediaEvent::TimeUpdate { position } => {
                if !self.dragging {
                    self.position = position;
                }
            }
            MediaEvent::Play => {
                self.play_pending = false;
                self.state = PlaybackState::Playing;
                self.show_controls(at);
            }
            MediaEvent::Pause => {
                self.play_pending = false;
                if !matches!(self.state, PlaybackState::Ended | PlaybackState::Error(_)) {
                    self.state = PlaybackState::Paused;
                }
                self.show_controls(at);
            }
            MediaEvent::Waiting => {
                let resume = match self.state {
                    PlaybackState::Playing => true,
                    PlaybackState::Paused | PlaybackState::Loading => false,
                    _ => return,
                };
                self.state = PlaybackState::Buffering { resume };
            }
            MediaEvent::CanPlay => {
                if let PlaybackState::Buffering { resume } = self.state {
                    self.state = if resume {
                        PlaybackState::Playing
                    } else {
                        PlaybackState::Paused
                    };
                }
            }
            MediaEvent::Ended => {
                self.state = PlaybackState::Ended;
                self.position = self.duration;
                self.show_controls(at);
            }
            MediaEvent::Error { message } => {
                warn!("Video error occurred: {}", message);
                self.play_pending = false;
                self.state = PlaybackState::Error(message);
                self.show_controls(at);
            }
            MediaEvent::FullscreenChanged(fullscreen) => self.fullscreen = fullscreen,
        }
    }

    /// Settles a pending play request. Interruptions from rapid toggling are
    /// expected and dropped.
    pub fn play_outcome(&mut self, outcome: PlayOutcome) {
        self.play_pending = false;
        match outcome {
            PlayOutcome::Started | PlayOutcome::Interrupted => {}
            PlayOutcome::Failed(message) => warn!("Video play failed: {}", message),
        }
    }

    pub fn handle_intent(&mut self, intent: Intent, at: Instant) -> Vec<Command> {
        if !self.access.is_granted() {
            debug!("Ignoring {:?} without access", intent);
            return Vec::new();
        }
        if let PlaybackState::Error(_) = self.state {
            return Vec::new();
        }
        match intent {
            Intent::TogglePlay => self.toggle_play(),
            Intent::Seek(t) => self.seek(t),
            Intent::Skip(delta) => self.seek(self.position + delta),
            Intent::DragStart => {
                self.dragging = true;
                self.show_controls(at);
                Vec::new()
            }
            Intent::DragEnd(t) => {
                self.dragging = false;
                let commands = self.seek(t);
                self.show_controls(at);
                commands
            }
            Intent::SetVolume(v) => {
                self.volume = v.max(0.0).min(1.0);
                self.muted = self.volume == 0.0;
                vec![Command::SetVolume(self.volume), Command::SetMuted(self.muted)]
            }
            Intent::ToggleMute => {
                if self.muted {
                    if self.volume == 0.0 {
                        self.volume = UNMUTE_VOLUME;
                    }
                    self.muted = false;
                    vec![Command::SetVolume(self.volume), Command::SetMuted(false)]
                } else {
                    self.muted = true;
                    vec![Command::SetMuted(true)]
                }
            }
            Intent::ToggleFullscreen => {
                if self.fullscreen {
                    vec![Command::ExitFullscreen]
                } else {
                    vec![Command::EnterFullscreen]
                }
            }
            Intent::SetPlaybackRate(rate) => {
                if !PLAYBACK_RATES.contains(&rate) {
                    debug!("Unsupported playback rate {}", rate);
                    return Vec::new();
                }
                self.rate = rate;
                vec![Command::SetRate(rate)]
            }
            Intent::SetQuality(resolution) => {
                if !self.is_selectable(resolution) {
                    debug!("{} is above the purchased quality", resolution.label());
                    return Vec::new();
                }
                if resolution == self.resolution {
                    return Vec::new();
                }
                self.resolution = resolution;
                vec![Command::SelectSource(resolution)]
            }
            Intent::SetSubtitles(track) => {
                if !SUBTITLE_TRACKS.contains(&track.as_str()) {
                    return Vec::new();
                }
                let shown = if track == SUBTITLE_TRACKS[0] {
                    None
                } else {
                    Some(track.clone())
                };
                self.subtitles = track;
                vec![Command::ShowSubtitles(shown)]
            }
            Intent::PointerMoved => {
                self.show_controls(at);
                Vec::new()
            }
            Intent::ToggleSettings => {
                self.settings_open = !self.settings_open;
                self.show_controls(at);
                Vec::new()
            }
            Intent::ToggleInfo => {
                self.info_open = !self.info_open;
                self.show_controls(at);
                Vec::new()
            }
            Intent::CloseMenus => {
                self.settings_open = false;
                self.info_open = false;
                self.show_controls(at);
                Vec::new()
            }
        }
    }

    fn toggle_play(&mut self) -> Vec<Command> {
        if self.is_playing() {
            return vec![Command::Pause];
        }
        if self.play_pending {
            return Vec::new();
        }
        self.play_pending = true;
        if self.state == PlaybackState::Ended {
            self.position = 0.0;
            return vec![Command::SeekTo(0.0), Command::Play];
        }
        vec![Command::Play]
    }

    fn seek(&mut self, t: f64) -> Vec<Command> {
        let target = t.max(0.0).min(self.duration);
        self.position = target;
        if self.state == PlaybackState::Ended && target < self.duration {
            self.state = PlaybackState::Paused;
        }
        vec![Command::SeekTo(target)]
    }

    fn show_controls(&mut self, at: Instant) {
        self.controls_visible = true;
        self.hide_at = if self.state == PlaybackState::Playing
            && !self.dragging
            && !self.settings_open
            && !self.info_open
        {
            Some(at + CONTROLS_HIDE_AFTER)
        } else {
            None
        };
    }

    fn refresh_countdown(&mut self, now: DateTime<Utc>) {
        let (kind, expires_at) = match self.access {
            Access::Granted {
                kind, expires_at, ..
            } => (Some(kind), expires_at),
            Access::Denied { reason, .. } => {
                if reason == DenyReason::Expired {
                    self.time_remaining = Some("Expired".to_owned());
                }
                return;
            }
        };
        let expires_at = match (kind, expires_at) {
            (Some(PurchaseType::Rent), Some(expires_at)) => expires_at,
            _ => return,
        };
        match remaining_text(expires_at - now) {
            Some(text) => self.time_remaining = Some(text),
            None => {
                self.access = Access::Denied {
                    reason: DenyReason::Expired,
                    kind,
                };
                self.time_remaining = Some("Expired".to_owned());
            }
        }
    }

    /// Advances the clocks: recomputes the rental countdown and applies the
    /// controls auto-hide deadline. A rental that ran out pauses playback.
    pub fn tick(&mut self, now: DateTime<Utc>, at: Instant) -> Vec<Command> {
        let was_playing = self.is_playing();
        let was_granted = self.access.is_granted();
        self.refresh_countdown(now);
        if was_granted && !self.access.is_granted() {
            debug!("Rental expired during playback");
            self.hide_at = None;
            self.controls_visible = true;
            if was_playing {
                self.state = PlaybackState::Paused;
                return vec![Command::Pause];
            }
            return Vec::new();
        }
        if let Some(deadline) = self.hide_at {
            if at >= deadline {
                self.controls_visible = false;
                self.hide_at = None;
            }
        }
        Vec::new()
    }

    pub fn view(&self) -> PlayerView {
        let prompt = match self.access {
            Access::Granted { .. } => None,
            Access::Denied { reason, .. } => Some(PurchasePrompt::for_reason(reason)),
        };
        let (kind, max_quality) = match self.access {
            Access::Granted {
                kind, max_quality, ..
            } => (Some(kind), Some(max_quality)),
            Access::Denied { kind, .. } => (kind, None),
        };
        PlayerView {
            has_access: self.access.is_granted(),
            prompt,
            access_type: kind,
            max_quality,
            state: self.state.name(),
            error: match &self.state {
                PlaybackState::Error(message) => Some(message.clone()),
                _ => None,
            },
            position: self.position,
            duration: self.duration,
            progress: if self.duration > 0.0 {
                self.position / self.duration * 100.0
            } else {
                0.0
            },
            volume: self.volume,
            muted: self.muted,
            fullscreen: self.fullscreen,
            rate: self.rate,
            subtitles: self.subtitles.clone(),
            controls_visible: self.controls_visible,
            settings_open: self.settings_open,
            info_open: self.info_open,
            time_remaining: self.time_remaining.clone(),
            quality_options: Resolution::MENU
                .iter()
                .map(|&r| QualityOption {
                    value: r,
                    label: r.label(),
                    description: r.description(),
                    selectable: self.is_selectable(r),
                    selected: r == self.resolution,
                })
                .collect(),
            playback_rates: PLAYBACK_RATES.to_vec(),
            subtitle_tracks: SUBTITLE_TRACKS.to_vec(),
        }
    }
}

/// Countdown text, or `None` once nothing is left.
pub fn remaining_text(left: chrono::Duration) -> Option<String> {
    let secs = left.num_seconds();
    if secs <= 0 {
        return None;
    }
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    Some(if days > 0 {
        format!("{}d {}h remaining", days, hours)
    } else if hours > 0 {
        format!("{}h {}m remaining", hours, minutes)
    } else {
        format!("{}m remaining", minutes)
    })
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PurchasePrompt {
    pub reason: DenyReason,
    pub title: &'static str,
    pub message: &'static str,
    pub action: &'static str,
}

impl PurchasePrompt {
    fn for_reason(reason: DenyReason) -> Self {
        match reason {
            DenyReason::NotPurchased => PurchasePrompt {
                reason,
                title: "Premium Content",
                message: "This movie requires a purchase or rental to watch. Choose your preferred viewing option below.",
                action: "Rent or Buy Movie",
            },
            DenyReason::Expired => PurchasePrompt {
                reason,
                title: "Rental Expired",
                message: "Your rental period has ended. Purchase or rent again to continue watching.",
                action: "Rent or Buy Again",
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityOption {
    pub value: Resolution,
    pub label: &'static str,
    pub description: &'static str,
    pub selectable: bool,
    pub selected: bool,
}

/// Snapshot handed to templates and to the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerView {
    pub has_access: bool,
    pub prompt: Option<PurchasePrompt>,
    pub access_type: Option<PurchaseType>,
    pub max_quality: Option<Quality>,
    pub state: &'static str,
    pub error: Option<String>,
    pub position: f64,
    pub duration: f64,
    pub progress: f64,
    pub volume: f64,
    pub muted: bool,
    pub fullscreen: bool,
    pub rate: f64,
    pub subtitles: String,
    pub controls_visible: bool,
    pub settings_open: bool,
    pub info_open: bool,
    pub time_remaining: Option<String>,
    pub quality_options: Vec<QualityOption>,
    pub playback_rates: Vec<f64>,
    pub subtitle_tracks: Vec<&'static str>,
}

/// `m:ss`, or `h:mm:ss` from an hour up.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_owned();
    }
    let total = seconds as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 20, 0, 0).unwrap()
    }

    fn rental(quality: Quality, expires_in: ChronoDuration) -> Access {
        Access::Granted {
            kind: PurchaseType::Rent,
            max_quality: quality,
            expires_at: Some(now() + expires_in),
        }
    }

    fn owned(quality: Quality) -> Access {
        Access::Granted {
            kind: PurchaseType::Buy,
            max_quality: quality,
            expires_at: None,
        }
    }

    fn loaded(access: Access) -> (Player, Instant) {
        let at = Instant::now();
        let mut player = Player::new(access, 0.0, now());
        player.handle_event(MediaEvent::MetadataLoaded { duration: 600.0 }, at);
        (player, at)
    }

    fn selected(player: &Player) -> &'static str {
        player
            .view()
            .quality_options
            .iter()
            .find(|o| o.selected)
            .map(|o| o.label)
            .unwrap()
    }

    #[test]
    fn lifecycle() {
        let (mut player, at) = loaded(owned(Quality::UHD));
        assert_eq!(player.view().state, "paused");
        assert_eq!(player.handle_intent(Intent::TogglePlay, at), vec![Command::Play]);
        player.handle_event(MediaEvent::Play, at);
        assert_eq!(player.view().state, "playing");
        player.handle_event(MediaEvent::Waiting, at);
        assert_eq!(player.view().state, "buffering");
        assert_eq!(player.handle_intent(Intent::TogglePlay, at), vec![Command::Pause]);
        player.handle_event(MediaEvent::CanPlay, at);
        assert_eq!(player.view().state, "playing");
        player.handle_event(MediaEvent::Ended, at);
        assert_eq!(player.view().state, "ended");
        assert_eq!(
            player.handle_intent(Intent::TogglePlay, at),
            vec![Command::SeekTo(0.0), Command::Play]
        );
    }

    #[test]
    fn paused_buffering_resumes_paused() {
        let (mut player, at) = loaded(owned(Quality::HD));
        player.handle_event(MediaEvent::Waiting, at);
        player.handle_event(MediaEvent::CanPlay, at);
        assert_eq!(player.view().state, "paused");
    }

    #[test]
    fn rapid_toggles_fold_into_one_play_request() {
        let (mut player, at) = loaded(owned(Quality::HD));
        assert_eq!(player.handle_intent(Intent::TogglePlay, at), vec![Command::Play]);
        assert!(player.handle_intent(Intent::TogglePlay, at).is_empty());
        player.play_outcome(PlayOutcome::Interrupted);
        assert_eq!(player.view().state, "paused");
        assert_eq!(player.handle_intent(Intent::TogglePlay, at), vec![Command::Play]);
    }

    #[test]
    fn media_error_is_non_fatal_state() {
        let (mut player, at) = loaded(owned(Quality::HD));
        player.handle_event(
            MediaEvent::Error {
                message: "decode".to_owned(),
            },
            at,
        );
        let view = player.view();
        assert_eq!(view.state, "error");
        assert_eq!(view.error.as_deref(), Some("decode"));
        assert!(view.controls_visible);
        assert!(player.handle_intent(Intent::TogglePlay, at).is_empty());
        assert!(player.handle_intent(Intent::Skip(10.0), at).is_empty());
    }

    #[test]
    fn seek_clamps_and_drag_suppresses_time_updates() {
        let (mut player, at) = loaded(owned(Quality::HD));
        assert_eq!(player.handle_intent(Intent::Seek(900.0), at), vec![Command::SeekTo(600.0)]);
        assert_eq!(player.handle_intent(Intent::Skip(-1000.0), at), vec![Command::SeekTo(0.0)]);
        player.handle_intent(Intent::DragStart, at);
        player.handle_event(MediaEvent::TimeUpdate { position: 42.0 }, at);
        assert_eq!(player.view().position, 0.0);
        player.handle_intent(Intent::DragEnd(120.0), at);
        player.handle_event(MediaEvent::TimeUpdate { position: 121.0 }, at);
        assert_eq!(player.view().position, 121.0);
    }

    #[test]
    fn volume_and_mute() {
        let (mut player, at) = loaded(owned(Quality::HD));
        player.handle_intent(Intent::SetVolume(1.7), at);
        assert_eq!(player.view().volume, 1.0);
        player.handle_intent(Intent::SetVolume(0.0), at);
        assert!(player.view().muted);
        assert_eq!(
            player.handle_intent(Intent::ToggleMute, at),
            vec![Command::SetVolume(0.5), Command::SetMuted(false)]
        );
    }

    #[test]
    fn rates_and_subtitles_are_whitelisted() {
        let (mut player, at) = loaded(owned(Quality::HD));
        assert!(player.handle_intent(Intent::SetPlaybackRate(3.0), at).is_empty());
        assert_eq!(
            player.handle_intent(Intent::SetPlaybackRate(1.5), at),
            vec![Command::SetRate(1.5)]
        );
        assert!(player
            .handle_intent(Intent::SetSubtitles("Klingon".to_owned()), at)
            .is_empty());
        assert_eq!(
            player.handle_intent(Intent::SetSubtitles("French".to_owned()), at),
            vec![Command::ShowSubtitles(Some("French".to_owned()))]
        );
        assert_eq!(player.view().subtitles, "French");
    }

    #[test]
    fn quality_is_capped_by_purchase() {
        let (mut player, at) = loaded(owned(Quality::HD));
        assert_eq!(selected(&player), "720p");
        assert!(player
            .handle_intent(Intent::SetQuality(Resolution::P1080), at)
            .is_empty());
        assert!(player
            .handle_intent(Intent::SetQuality(Resolution::P2160), at)
            .is_empty());
        assert_eq!(selected(&player), "720p");
        assert_eq!(
            player.handle_intent(Intent::SetQuality(Resolution::P360), at),
            vec![Command::SelectSource(Resolution::P360)]
        );
        let view = player.view();
        assert_eq!(view.quality_options.len(), 5);
        let selectable: Vec<_> = view
            .quality_options
            .iter()
            .filter(|o| o.selectable)
            .map(|o| o.label)
            .collect();
        assert_eq!(selectable, vec!["720p", "480p", "360p"]);
    }

    #[test]
    fn controls_hide_after_idle_playback() {
        let (mut player, at) = loaded(owned(Quality::HD));
        player.handle_event(MediaEvent::Play, at);
        player.tick(now(), at + Duration::from_secs(2));
        assert!(player.view().controls_visible);
        player.tick(now(), at + Duration::from_secs(3));
        assert!(!player.view().controls_visible);
        let later = at + Duration::from_secs(10);
        player.handle_intent(Intent::PointerMoved, later);
        assert!(player.view().controls_visible);
        player.handle_intent(Intent::ToggleSettings, later);
        assert!(player.view().settings_open);
        player.tick(now(), later + Duration::from_secs(30));
        assert!(player.view().controls_visible);
    }

    #[test]
    fn paused_controls_stay_visible() {
        let (mut player, at) = loaded(owned(Quality::HD));
        player.handle_event(MediaEvent::Play, at);
        player.handle_event(MediaEvent::Pause, at + Duration::from_secs(1));
        player.tick(now(), at + Duration::from_secs(60));
        assert!(player.view().controls_visible);
    }

    #[test]
    fn countdown_text() {
        let remaining = |left| Player::new(rental(Quality::HD, left), 0.0, now()).view().time_remaining;
        assert_eq!(remaining(ChronoDuration::hours(50)).as_deref(), Some("2d 2h remaining"));
        assert_eq!(remaining(ChronoDuration::minutes(95)).as_deref(), Some("1h 35m remaining"));
        assert_eq!(remaining(ChronoDuration::minutes(7)).as_deref(), Some("7m remaining"));
        let player = Player::new(owned(Quality::HD), 0.0, now());
        assert_eq!(player.view().time_remaining, None);
    }

    #[test]
    fn rental_expiry_revokes_access_mid_playback() {
        let (mut player, at) = loaded(rental(Quality::FHD, ChronoDuration::minutes(2)));
        player.handle_event(MediaEvent::Play, at);
        let commands = player.tick(now() + ChronoDuration::minutes(3), at);
        assert_eq!(commands, vec![Command::Pause]);
        let view = player.view();
        assert!(!view.has_access);
        assert_eq!(view.prompt.unwrap().title, "Rental Expired");
        assert_eq!(view.time_remaining.as_deref(), Some("Expired"));
        assert!(player.handle_intent(Intent::TogglePlay, at).is_empty());
    }

    #[test]
    fn no_grant_shows_purchase_prompt() {
        let access = Access::from_grant(None, now());
        let mut player = Player::new(access, 5400.0, now());
        let at = Instant::now();
        assert!(player.handle_intent(Intent::TogglePlay, at).is_empty());
        player.handle_event(MediaEvent::Play, at);
        assert_eq!(player.view().state, "loading");
        let view = player.view();
        assert_eq!(view.prompt.unwrap().title, "Premium Content");
        assert!(view.quality_options.iter().all(|o| !o.selectable));
    }

    #[test]
    fn expired_grant_is_denied() {
        let item = LibraryItem {
            id: 1,
            title: "Old".to_owned(),
            poster_path: String::new(),
            kind: PurchaseType::Rent,
            purchase_date: now() - ChronoDuration::days(2),
            expiry_date: Some(now() - ChronoDuration::days(1)),
            quality: Quality::HD,
            price: 29,
        };
        assert_eq!(
            Access::from_grant(Some(&item), now()),
            Access::Denied {
                reason: DenyReason::Expired,
                kind: Some(PurchaseType::Rent),
            }
        );
    }

    #[test]
    fn keyboard_shortcuts() {
        let (player, _) = loaded(owned(Quality::HD));
        assert_eq!(Intent::from_key("Space", &player), Some(Intent::TogglePlay));
        assert_eq!(Intent::from_key("Comma", &player), Some(Intent::SetPlaybackRate(0.75)));
        assert_eq!(Intent::from_key("ArrowUp", &player), Some(Intent::SetVolume(1.0)));
        assert_eq!(Intent::from_key("KeyZ", &player), None);
    }

    #[test]
    fn page_inputs_decode() {
        let input = |json: &str| serde_json::from_str::<PlayerInput>(json).unwrap();
        assert_eq!(
            input(r#"{"event": {"type": "metadata_loaded", "value": {"duration": 90.5}}}"#),
            PlayerInput::Event(MediaEvent::MetadataLoaded { duration: 90.5 })
        );
        assert_eq!(
            input(r#"{"event": {"type": "fullscreen_changed", "value": true}}"#),
            PlayerInput::Event(MediaEvent::FullscreenChanged(true))
        );
        assert_eq!(
            input(r#"{"intent": {"type": "toggle_play"}}"#),
            PlayerInput::Intent(Intent::TogglePlay)
        );
        assert_eq!(
            input(r#"{"intent": {"type": "set_quality", "value": "480p"}}"#),
            PlayerInput::Intent(Intent::SetQuality(Resolution::P480))
        );
        assert_eq!(
            input(r#"{"play_outcome": {"type": "interrupted"}}"#),
            PlayerInput::PlayOutcome(PlayOutcome::Interrupted)
        );
        assert_eq!(input(r#"{"key": "Space"}"#), PlayerInput::Key("Space".to_owned()));
        assert_eq!(input(r#""tick""#), PlayerInput::Tick);
    }

    #[test]
    fn commands_encode_for_the_page() {
        let json = serde_json::to_value(vec![
            Command::Play,
            Command::SeekTo(12.5),
            Command::SelectSource(Resolution::P720),
        ])
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"type": "play"},
                {"type": "seek_to", "value": 12.5},
                {"type": "select_source", "value": "720p"}
            ])
        );
    }

    #[test]
    fn interrupted_play_through_apply() {
        let (mut player, at) = loaded(owned(Quality::HD));
        let update = player.apply(PlayerInput::Key("Space".to_owned()), now(), at);
        assert_eq!(update.commands, vec![Command::Play]);
        let update = player.apply(PlayerInput::Intent(Intent::TogglePlay), now(), at);
        assert!(update.commands.is_empty());
        let update = player.apply(PlayerInput::PlayOutcome(PlayOutcome::Interrupted), now(), at);
        assert!(update.commands.is_empty());
        assert_eq!(update.view.state, "paused");
        assert!(player.apply(PlayerInput::Key("KeyZ".to_owned()), now(), at).commands.is_empty());
    }

    #[test]
    fn time_format() {
        assert_eq!(format_time(65.4), "1:05");
        assert_eq!(format_time(3725.0), "1:02:05");
        assert_eq!(format_time(f64::NAN), "0:00");
    }
}
