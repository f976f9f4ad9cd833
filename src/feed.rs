//! JSON-lines hand observation feed.
//!
//! Each line is one video frame as produced by an external hand tracker:
//!
//! ```text
//! {"t": 0.033, "hands": [{"hand": "left", "x": 0.41, "y": 0.62},
//!                        {"hand": "Right", "landmarks": [[0.6, 0.5], [0.62, 0.48]]}]}
//! ```
//!
//! `t` is seconds since capture start and may be omitted, in which case the
//! frame is stamped on arrival. A negative or unrepresentable `t` makes the
//! line malformed. Landmark lists are reduced to their centroid.

use crate::error::FeedError;
use crate::frame::{HandFrame, HandObservation, Point, SessionClock, Timestamp};

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::debug;

/// Anything that delivers hand frames to a session, file replay or live simulation
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame, `Ok(None)` once the source is exhausted
    async fn next_frame(&mut self) -> Result<Option<HandFrame>, FeedError>;
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    t: Option<f64>,
    #[serde(default)]
    hands: Vec<RawHand>,
}

#[derive(Debug, Deserialize)]
struct RawHand {
    hand: String,
    x: Option<f64>,
    y: Option<f64>,
    landmarks: Option<Vec<[f64; 2]>>,
}

impl RawHand {
    fn into_observation(self, line: usize) -> Result<HandObservation, FeedError> {
        match (self.x, self.y, self.landmarks) {
            (Some(x), Some(y), _) => Ok(HandObservation::new(self.hand, Point::new(x, y))),
            (_, _, Some(landmarks)) => {
                let points: Vec<Point> = landmarks
                    .iter()
                    .map(|[x, y]| Point::new(*x, *y))
                    .collect();
                HandObservation::from_landmarks(&self.hand, &points)
                    .map_err(|source| FeedError::Input { line, source })
            }
            _ => Err(FeedError::MissingPosition { line }),
        }
    }
}

/// Reads [`HandFrame`]s from any line-oriented async source
pub struct FeedReader<R> {
    lines: Lines<R>,
    line_no: usize,
    clock: SessionClock,
}

impl FeedReader<BufReader<File>> {
    /// Open a feed file
    pub async fn open<P: AsRef<Path>>(path: P, clock: SessionClock) -> Result<Self, FeedError> {
        let file = File::open(path.as_ref()).await?;
        debug!("Reading hand feed from {}", path.as_ref().display());
        Ok(Self::new(BufReader::new(file), clock))
    }
}

impl FeedReader<BufReader<Stdin>> {
    /// Read the feed from standard input
    pub fn stdin(clock: SessionClock) -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), clock)
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> FrameSource for FeedReader<R> {
    async fn next_frame(&mut self) -> Result<Option<HandFrame>, FeedError> {
        self.read_frame().await
    }
}

impl<R: AsyncBufRead + Unpin> FeedReader<R> {
    pub fn new(reader: R, clock: SessionClock) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            clock,
        }
    }

    /// Next frame, `Ok(None)` at end of input.
    ///
    /// A malformed line yields an error carrying its line number; the
    /// following call resumes with the next line.
    pub async fn read_frame(&mut self) -> Result<Option<HandFrame>, FeedError> {
        loop {
            let line = match self.lines.next_line().await? {
                Some(line) => line,
                None => return Ok(None),
            };
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            return self.parse_line(trimmed).map(Some);
        }
    }

    fn parse_line(&self, line: &str) -> Result<HandFrame, FeedError> {
        let line_no = self.line_no;
        let raw: RawFrame = serde_json::from_str(line).map_err(|source| FeedError::Parse {
            line: line_no,
            source,
        })?;

        let timestamp = match raw.t {
            Some(secs) => Timestamp::try_from_secs_f64(secs).ok_or(FeedError::InvalidTimestamp {
                line: line_no,
                value: secs,
            })?,
            None => self.clock.now(),
        };

        let hands = raw
            .hands
            .into_iter()
            .map(|hand| hand.into_observation(line_no))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(HandFrame::new(timestamp, hands))
    }

    /// Number of lines consumed so far
    pub fn line_number(&self) -> usize {
        self.line_no
    }
}
