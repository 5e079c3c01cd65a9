//! Synthetic key presses toward whatever window has input focus.

#[cfg(all(unix, not(target_os = "macos")))]
static EXECUTABLE_XDOTOOL: &'static str = "xdotool";
#[cfg(target_os = "macos")]
static EXECUTABLE_OSASCRIPT: &'static str = "osascript";
#[cfg(windows)]
static EXECUTABLE_POWERSHELL: &'static str = "powershell";

/// A key that may be pressed remotely: any single character, or one of a
/// few named keys.
///
/// ```rust
/// use gamectl::input::Key;
///
/// assert_eq!("Enter".parse::<Key>(), Ok(Key::Enter));
/// assert_eq!("Q".parse::<Key>(), Ok(Key::Char('q')));
/// assert!("F9".parse::<Key>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Esc,
    Space,
    Up,
    Down,
    Left,
    Right,
}

/// Names of the multi-character keys that may be pressed.
pub static NAMED_KEYS: [&'static str; 7] = ["enter", "esc", "space", "up", "down", "left", "right"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidKey(pub String);
impl std::error::Error for InvalidKey {}
impl std::fmt::Display for InvalidKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid key '{}': expected a single character or one of {}",
            self.0,
            NAMED_KEYS.join(", ")
        )
    }
}

impl std::str::FromStr for Key {
    type Err = InvalidKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars: std::str::Chars = s.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return match c {
                ' ' => Ok(Key::Space),
                c => Ok(Key::Char(c.to_ascii_lowercase())),
            };
        }

        return match s.to_lowercase().as_str() {
            "enter" => Ok(Key::Enter),
            "esc" => Ok(Key::Esc),
            "space" => Ok(Key::Space),
            "up" => Ok(Key::Up),
            "down" => Ok(Key::Down),
            "left" => Ok(Key::Left),
            "right" => Ok(Key::Right),
            _ => Err(InvalidKey(s.into())),
        };
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{c}"),
            Key::Enter => write!(f, "enter"),
            Key::Esc => write!(f, "esc"),
            Key::Space => write!(f, "space"),
            Key::Up => write!(f, "up"),
            Key::Down => write!(f, "down"),
            Key::Left => write!(f, "left"),
            Key::Right => write!(f, "right"),
        }
    }
}

impl<'de> serde::Deserialize<'de> for Key {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s: String = serde::Deserialize::deserialize(deserializer)?;
        return s.parse::<Key>().map_err(serde::de::Error::custom);
    }
}

/// Sends key presses. The target application may need time to register
/// each press, so pacing repeated presses is up to the caller.
pub trait InputInjector: Send + Sync + 'static {
    fn press(&self, key: Key) -> Result<(), crate::proc::Error>;
}

/// [`InputInjector`] backed by the host's desktop automation tooling.
pub struct SystemKeyboard;

#[cfg(all(unix, not(target_os = "macos")))]
impl InputInjector for SystemKeyboard {
    fn press(&self, key: Key) -> Result<(), crate::proc::Error> {
        let xdotool: crate::proc::Tool = crate::proc::Tool::new(EXECUTABLE_XDOTOOL);
        return match xdotool_keysym(key) {
            Some(keysym) => xdotool.run(&["key", "--clearmodifiers", keysym]),
            None => xdotool.run(&["type", "--delay", "0", "--", &key.to_string()]),
        };
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
/// Characters are typed instead.
fn xdotool_keysym(key: Key) -> Option<&'static str> {
    match key {
        Key::Enter => Some("Return"),
        Key::Esc => Some("Escape"),
        Key::Space => Some("space"),
        Key::Up => Some("Up"),
        Key::Down => Some("Down"),
        Key::Left => Some("Left"),
        Key::Right => Some("Right"),
        Key::Char(_) => None,
    }
}

#[cfg(target_os = "macos")]
impl InputInjector for SystemKeyboard {
    fn press(&self, key: Key) -> Result<(), crate::proc::Error> {
        let script: String = match key {
            Key::Char(c) => {
                let escaped: String = match c {
                    '"' | '\\' => format!("\\{c}"),
                    c => c.to_string(),
                };
                format!("tell application \"System Events\" to keystroke \"{escaped}\"")
            }
            named => {
                let code: u8 = match named {
                    Key::Enter => 36,
                    Key::Esc => 53,
                    Key::Space => 49,
                    Key::Up => 126,
                    Key::Down => 125,
                    Key::Left => 123,
                    _ => 124,
                };
                format!("tell application \"System Events\" to key code {code}")
            }
        };
        return crate::proc::Tool::new(EXECUTABLE_OSASCRIPT).run(&["-e", &script]);
    }
}

#[cfg(windows)]
impl InputInjector for SystemKeyboard {
    fn press(&self, key: Key) -> Result<(), crate::proc::Error> {
        let script: String = format!(
            "(New-Object -ComObject WScript.Shell).SendKeys('{}')",
            send_keys_notation(key).replace('\'', "''")
        );
        return crate::proc::Tool::new(EXECUTABLE_POWERSHELL).run(&[
            "-NoProfile",
            "-NonInteractive",
            "-Command",
            &script,
        ]);
    }
}

/// `WScript.Shell.SendKeys` notation of a key.
#[cfg_attr(not(windows), allow(dead_code))]
fn send_keys_notation(key: Key) -> String {
    match key {
        Key::Char(c) if "+^%~(){}[]".contains(c) => format!("{{{c}}}"),
        Key::Char(c) => c.to_string(),
        Key::Enter => "{ENTER}".into(),
        Key::Esc => "{ESC}".into(),
        Key::Space => " ".into(),
        Key::Up => "{UP}".into(),
        Key::Down => "{DOWN}".into(),
        Key::Left => "{LEFT}".into(),
        Key::Right => "{RIGHT}".into(),
    }
}
