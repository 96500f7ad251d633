//! In-memory collaborators for pipeline and scheduler tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use marketwatch::browser::Result;
use marketwatch::{
    Browser, BrowserError, BrowserSession, CandidateHandle, ListingRecord, Mailer, Notification,
    NotifyError,
};

#[derive(Debug, Clone)]
pub struct FakeCandidate {
    pub href: Option<String>,
    pub title: std::result::Result<String, String>,
    pub panics: bool,
}

impl FakeCandidate {
    pub fn listing(title: &str, href: &str) -> Self {
        Self {
            href: Some(href.to_string()),
            title: Ok(title.to_string()),
            panics: false,
        }
    }

    pub fn without_href(title: &str) -> Self {
        Self {
            href: None,
            title: Ok(title.to_string()),
            panics: false,
        }
    }

    pub fn broken_title(href: &str) -> Self {
        Self {
            href: Some(href.to_string()),
            title: Err("stale element reference".to_string()),
            panics: false,
        }
    }

    pub fn panicking(href: &str) -> Self {
        Self {
            href: Some(href.to_string()),
            title: Ok(String::new()),
            panics: true,
        }
    }
}

#[async_trait]
impl CandidateHandle for FakeCandidate {
    async fn href(&self) -> Result<Option<String>> {
        if self.panics {
            panic!("element handle poisoned");
        }
        Ok(self.href.clone())
    }

    async fn title(&self) -> Result<String> {
        self.title.clone().map_err(BrowserError::Field)
    }
}

#[derive(Debug, Clone)]
pub enum FakePage {
    Results(Vec<FakeCandidate>),
    Timeout,
    Broken,
}

#[derive(Debug, Default)]
pub struct BrowserLog {
    pub launches: usize,
    pub closes: usize,
    pub queries: Vec<String>,
}

#[derive(Clone, Default)]
pub struct FakeBrowser {
    pages: Arc<Mutex<HashMap<String, FakePage>>>,
    fail_launch: bool,
    pub log: Arc<Mutex<BrowserLog>>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_launch() -> Self {
        Self {
            fail_launch: true,
            ..Self::default()
        }
    }

    pub fn with_page(self, term: &str, page: FakePage) -> Self {
        self.pages.lock().unwrap().insert(term.to_string(), page);
        self
    }

    pub fn with_results(self, term: &str, candidates: Vec<FakeCandidate>) -> Self {
        self.with_page(term, FakePage::Results(candidates))
    }

    pub fn launches(&self) -> usize {
        self.log.lock().unwrap().launches
    }

    pub fn closes(&self) -> usize {
        self.log.lock().unwrap().closes
    }

    pub fn queries(&self) -> Vec<String> {
        self.log.lock().unwrap().queries.clone()
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    type Session = FakeSession;

    async fn launch(&self) -> Result<FakeSession> {
        if self.fail_launch {
            return Err(BrowserError::Setup("chromedriver not reachable".to_string()));
        }
        self.log.lock().unwrap().launches += 1;
        Ok(FakeSession {
            pages: self.pages.clone(),
            log: self.log.clone(),
            current: None,
        })
    }
}

pub struct FakeSession {
    pages: Arc<Mutex<HashMap<String, FakePage>>>,
    log: Arc<Mutex<BrowserLog>>,
    current: Option<String>,
}

#[async_trait]
impl BrowserSession for FakeSession {
    type Handle = FakeCandidate;

    async fn open_search(&mut self, term: &str) -> Result<()> {
        self.log.lock().unwrap().queries.push(term.to_string());
        self.current = Some(term.to_string());
        Ok(())
    }

    async fn find_candidates(&mut self) -> Result<Vec<FakeCandidate>> {
        let term = self.current.clone().unwrap_or_default();
        match self.pages.lock().unwrap().get(&term).cloned() {
            Some(FakePage::Results(candidates)) => Ok(candidates),
            Some(FakePage::Timeout) => Err(BrowserError::Timeout("a[role='link']".to_string())),
            Some(FakePage::Broken) => Err(BrowserError::Navigation("tab crashed".to_string())),
            None => Ok(Vec::new()),
        }
    }

    async fn close(self) -> Result<()> {
        self.log.lock().unwrap().closes += 1;
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct FakeMailer {
    pub sent: Arc<Mutex<Vec<Notification>>>,
    pub fail: bool,
}

impl FakeMailer {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send(&self, notification: &Notification) -> std::result::Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Transport("connection refused".to_string()));
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

pub fn item(n: usize) -> String {
    format!("https://www.facebook.com/marketplace/item/{n}/")
}

pub fn read_log(path: &std::path::Path) -> Vec<ListingRecord> {
    if !path.exists() {
        return Vec::new();
    }
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader.deserialize().map(|r| r.unwrap()).collect()
}
