#![allow(dead_code)]

use async_trait::async_trait;
use intel_feeds::source_of_record::windy::Webcam;
use intel_feeds::{ErrorKind, FetchKey, SourceOfRecord};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub type Outcome<T> = Result<Vec<T>, ErrorKind>;

/// Replays queued outcomes per key. Once a key's queue is drained the last outcome repeats.
pub struct Scripted<T> {
    script: Mutex<HashMap<String, VecDeque<(Duration, Outcome<T>)>>>,
    last: Mutex<HashMap<String, (Duration, Outcome<T>)>>,
    calls: AtomicUsize,
    timeout: Duration,
}

impl<T: Clone + Send + Sync + 'static> Scripted<T> {
    pub fn new() -> Self {
        Scripted {
            script: Mutex::new(HashMap::new()),
            last: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn then(self, key: &FetchKey, delay: Duration, outcome: Outcome<T>) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry(key.canonical())
            .or_default()
            .push_back((delay, outcome));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> SourceOfRecord<T> for Scripted<T> {
    fn name(&self) -> &str {
        "scripted"
    }

    fn timeout(&self, _key: &FetchKey) -> Duration {
        self.timeout
    }

    async fn retrieve(&self, key: &FetchKey) -> Result<Vec<T>, ErrorKind> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let canonical = key.canonical();

        let next = self
            .script
            .lock()
            .unwrap()
            .get_mut(&canonical)
            .and_then(VecDeque::pop_front);
        let (delay, outcome) = match next {
            Some(step) => {
                self.last.lock().unwrap().insert(canonical, step.clone());
                step
            }
            None => self
                .last
                .lock()
                .unwrap()
                .get(&canonical)
                .cloned()
                .unwrap_or((Duration::ZERO, Err(ErrorKind::NotFound))),
        };

        tokio::time::sleep(delay).await;
        outcome
    }
}

pub fn cam(id: &str, title: &str) -> Webcam {
    Webcam {
        id: id.to_string(),
        title: title.to_string(),
        url: format!("https://x.test/{}", id),
        status: Some("active".to_string()),
        player: None,
        thumbnail: None,
        location: None,
    }
}

/// Lets spawned fetches run to completion under a paused clock.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
