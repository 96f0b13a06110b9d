//! Terminal deck simulator.
//!
//! Key faces are logged instead of drawn and key transitions are read from
//! stdin, one command per line:
//!
//! - `down N`, `up N`: raw transitions
//! - `press N`: down then up
//! - `hold N DURATION`: down, wait (humantime, e.g. `800ms`), up

use std::{result::Result as StdResult, time::Duration};

use async_trait::async_trait;
use image::RgbaImage;
use keydeck_engine::{
    Error, Result,
    deps::{Deck, KeyEvent},
};
use parking_lot::Mutex;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt as _, BufReader, stdin},
    sync::mpsc,
    time::sleep,
};
use tracing::{debug, info, warn};

/// What a console key currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Face {
    /// Nothing drawn since the last clear.
    Blank,
    /// Solid color.
    Color([u8; 4]),
    /// Rendered image; only its mean color is kept.
    Image([u8; 4]),
}

/// Deck that logs faces and keeps the latest one per key.
pub struct ConsoleDeck {
    /// Edge length of a key face.
    icon_size: u32,
    /// Current faces, indexed by key.
    faces: Mutex<Vec<Face>>,
    /// Last brightness set.
    brightness: Mutex<u8>,
}

impl ConsoleDeck {
    /// A deck with `keys` keys of `icon_size` pixels.
    pub fn new(keys: usize, icon_size: u32) -> Self {
        Self {
            icon_size,
            faces: Mutex::new(vec![Face::Blank; keys]),
            brightness: Mutex::new(0),
        }
    }

    /// Current face of every key.
    #[cfg(test)]
    pub fn faces(&self) -> Vec<Face> {
        self.faces.lock().clone()
    }

    /// Current brightness.
    #[cfg(test)]
    pub fn brightness(&self) -> u8 {
        *self.brightness.lock()
    }

    /// Store `face` for `key`.
    fn set(&self, key: usize, face: Face) -> Result<()> {
        let mut faces = self.faces.lock();
        let slot = faces
            .get_mut(key)
            .ok_or_else(|| Error::Device(format!("key {} out of range", key)))?;
        info!(key, face = ?face, "key_face");
        *slot = face;
        Ok(())
    }
}

/// Average color of `img`.
fn mean_color(img: &RgbaImage) -> [u8; 4] {
    let n = u64::from(img.width()) * u64::from(img.height());
    if n == 0 {
        return [0, 0, 0, 0];
    }
    let mut sums = [0u64; 4];
    for p in img.pixels() {
        for (s, c) in sums.iter_mut().zip(p.0) {
            *s += u64::from(c);
        }
    }
    sums.map(|s| (s / n) as u8)
}

#[async_trait]
impl Deck for ConsoleDeck {
    fn num_keys(&self) -> usize {
        self.faces.lock().len()
    }

    fn icon_size(&self) -> u32 {
        self.icon_size
    }

    async fn clear_all_keys(&self) -> Result<()> {
        debug!("deck_clear");
        self.faces.lock().fill(Face::Blank);
        Ok(())
    }

    async fn fill_color(&self, key: usize, rgba: [u8; 4]) -> Result<()> {
        self.set(key, Face::Color(rgba))
    }

    async fn fill_image(&self, key: usize, img: &RgbaImage) -> Result<()> {
        self.set(key, Face::Image(mean_color(img)))
    }

    async fn set_brightness(&self, pct: u8) -> Result<()> {
        info!(pct, "deck_brightness");
        *self.brightness.lock() = pct;
        Ok(())
    }

    async fn reset_to_logo(&self) -> Result<()> {
        info!("deck_reset");
        self.faces.lock().fill(Face::Blank);
        Ok(())
    }
}

/// One parsed stdin command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// Key pressed.
    Down(usize),
    /// Key released.
    Up(usize),
    /// Short press.
    Press(usize),
    /// Press held for a duration.
    Hold(usize, Duration),
}

impl Input {
    /// Parse one command line. Blank lines parse to `None`.
    pub fn parse(line: &str) -> StdResult<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let key = words
            .next()
            .ok_or_else(|| format!("{}: missing key index", verb))?
            .parse::<usize>()
            .map_err(|e| format!("{}: bad key index: {}", verb, e))?;
        let input = match verb {
            "down" => Self::Down(key),
            "up" => Self::Up(key),
            "press" => Self::Press(key),
            "hold" => {
                let d = words
                    .next()
                    .ok_or_else(|| "hold: missing duration".to_string())?;
                let d = humantime::parse_duration(d).map_err(|e| format!("hold: {}", e))?;
                Self::Hold(key, d)
            }
            other => return Err(format!("unknown command {:?}", other)),
        };
        match words.next() {
            Some(extra) => Err(format!("{}: unexpected {:?}", verb, extra)),
            None => Ok(Some(input)),
        }
    }

    /// Send the key events for this command, waiting between them.
    async fn replay(self, tx: &mpsc::Sender<KeyEvent>) -> bool {
        let (key, held) = match self {
            Self::Down(k) => return tx.send(KeyEvent::down(k)).await.is_ok(),
            Self::Up(k) => return tx.send(KeyEvent::up(k)).await.is_ok(),
            Self::Press(k) => (k, Duration::ZERO),
            Self::Hold(k, d) => (k, d),
        };
        if tx.send(KeyEvent::down(key)).await.is_err() {
            return false;
        }
        if !held.is_zero() {
            sleep(held).await;
        }
        tx.send(KeyEvent::up(key)).await.is_ok()
    }
}

/// Forward commands read from `reader` as key events until EOF or until the
/// receiver goes away.
pub async fn read_inputs<R>(reader: R, tx: mpsc::Sender<KeyEvent>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(l)) => l,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "console_read_failed");
                break;
            }
        };
        match Input::parse(&line) {
            Ok(Some(input)) => {
                if !input.replay(&tx).await {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => warn!(line = %line, error = %e, "console_bad_input"),
        }
    }
    debug!("console_input_closed");
}

/// Spawn the stdin reader, returning the event receiver.
pub fn spawn_stdin_reader() -> mpsc::Receiver<KeyEvent> {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(read_inputs(BufReader::new(stdin()), tx));
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(Input::parse("down 3"), Ok(Some(Input::Down(3))));
        assert_eq!(Input::parse("  up 0 "), Ok(Some(Input::Up(0))));
        assert_eq!(Input::parse("press 7"), Ok(Some(Input::Press(7))));
        assert_eq!(
            Input::parse("hold 2 800ms"),
            Ok(Some(Input::Hold(2, Duration::from_millis(800))))
        );
        assert_eq!(Input::parse(""), Ok(None));
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!(Input::parse("down").is_err());
        assert!(Input::parse("down x").is_err());
        assert!(Input::parse("hold 1").is_err());
        assert!(Input::parse("tap 1").is_err());
        assert!(Input::parse("up 1 2").is_err());
    }

    #[tokio::test]
    async fn stdin_lines_become_events() {
        let (tx, mut rx) = mpsc::channel(8);
        let input: &[u8] = b"press 1\nbogus\ndown 4\n";
        read_inputs(input, tx).await;
        assert_eq!(rx.recv().await, Some(KeyEvent::down(1)));
        assert_eq!(rx.recv().await, Some(KeyEvent::up(1)));
        assert_eq!(rx.recv().await, Some(KeyEvent::down(4)));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn faces_track_writes() {
        let deck = ConsoleDeck::new(2, 4);
        deck.fill_color(0, [1, 2, 3, 255]).await.unwrap();
        let img = RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 255]));
        deck.fill_image(1, &img).await.unwrap();
        assert_eq!(
            deck.faces(),
            vec![Face::Color([1, 2, 3, 255]), Face::Image([10, 20, 30, 255])]
        );
        assert!(matches!(
            deck.fill_color(2, [0; 4]).await,
            Err(Error::Device(_))
        ));
        deck.clear_all_keys().await.unwrap();
        assert_eq!(deck.faces(), vec![Face::Blank, Face::Blank]);
        deck.set_brightness(40).await.unwrap();
        assert_eq!(deck.brightness(), 40);
    }
}
