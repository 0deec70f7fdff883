/// How completion percentage is derived from ffmpeg's `-progress`
/// key=value stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    /// out_time against the known source duration.
    Time,
    /// frame count against the estimated total frames.
    Frame,
    /// No usable reference; progress reporting is off.
    Disabled,
}

/// Tracks encode progress from `-progress pipe:1` output.
///
/// Pure state machine: feed lines in, get the updated percentage out.
/// Starts in time mode when the source duration is known and demotes
/// time -> frame -> disabled after two consecutive unparsable
/// position updates, so one garbled line never kills reporting.
#[derive(Debug)]
pub struct ProgressTracker {
    mode: ProgressMode,
    duration: Option<f64>,
    total_frames: Option<u64>,
    strikes: u8,
    percent: f64,
    speed: Option<String>,
    finished: bool,
}

const MAX_STRIKES: u8 = 2;

impl ProgressTracker {
    pub fn new(duration: Option<f64>, total_frames: Option<u64>) -> Self {
        let duration = duration.filter(|d| *d > 0.0);
        let total_frames = total_frames.filter(|f| *f > 0);
        let mode = if duration.is_some() {
            ProgressMode::Time
        } else if total_frames.is_some() {
            ProgressMode::Frame
        } else {
            ProgressMode::Disabled
        };
        Self {
            mode,
            duration,
            total_frames,
            strikes: 0,
            percent: 0.0,
            speed: None,
            finished: false,
        }
    }

    pub fn mode(&self) -> ProgressMode {
        self.mode
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    /// Encoder speed string from the last `speed=` line, e.g. "3.1x".
    pub fn speed(&self) -> Option<&str> {
        self.speed.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one progress line. Returns the new percentage when this
    /// line advanced it.
    pub fn update(&mut self, line: &str) -> Option<f64> {
        let (key, value) = line.trim().split_once('=')?;
        let key = key.trim();
        let value = value.trim();

        match key {
            "speed" if value != "N/A" => {
                self.speed = Some(value.to_string());
                None
            }
            "progress" => {
                if value == "end" {
                    self.finished = true;
                    if self.mode != ProgressMode::Disabled {
                        self.percent = 100.0;
                        return Some(100.0);
                    }
                }
                None
            }
            "out_time" if self.mode == ProgressMode::Time => {
                match (parse_clock(value), self.duration) {
                    (Some(secs), Some(total)) => {
                        self.strikes = 0;
                        self.set_percent(secs / total * 100.0)
                    }
                    _ => {
                        self.strike();
                        None
                    }
                }
            }
            // Both keys carry microseconds; out_time_ms is a
            // misnomer ffmpeg kept for compatibility.
            "out_time_ms" | "out_time_us" if self.mode == ProgressMode::Time => {
                match (value.parse::<i64>().ok(), self.duration) {
                    (Some(micros), Some(total)) if micros >= 0 => {
                        self.strikes = 0;
                        self.set_percent(micros as f64 / 1_000_000.0 / total * 100.0)
                    }
                    _ => {
                        self.strike();
                        None
                    }
                }
            }
            "frame" if self.mode == ProgressMode::Frame => {
                match (value.parse::<u64>().ok(), self.total_frames) {
                    (Some(frame), Some(total)) => {
                        self.strikes = 0;
                        self.set_percent(frame as f64 / total as f64 * 100.0)
                    }
                    _ => {
                        self.strike();
                        None
                    }
                }
            }
            _ => None,
        }
    }

    fn set_percent(&mut self, raw: f64) -> Option<f64> {
        let clamped = raw.clamp(0.0, 100.0);
        if clamped > self.percent {
            self.percent = clamped;
            Some(clamped)
        } else {
            None
        }
    }

    fn strike(&mut self) {
        self.strikes += 1;
        if self.strikes < MAX_STRIKES {
            return;
        }
        self.strikes = 0;
        self.mode = match self.mode {
            ProgressMode::Time if self.total_frames.is_some() => ProgressMode::Frame,
            _ => ProgressMode::Disabled,
        };
    }
}

/// Parse an ffmpeg clock value ("HH:MM:SS.micros") into seconds.
fn parse_clock(raw: &str) -> Option<f64> {
    let mut parts = raw.split(':');
    let hours: f64 = parts.next()?.trim().parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || hours < 0.0 || minutes < 0.0 || seconds < 0.0 {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}
