// Path routing: the location history, the reactive current path and the route parser.

use std::collections::HashMap;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tokio::sync::watch;

pub const AUTHOR_NAME_PARAM: &str = "authorName";

const PROFILE_PREFIX: &str = "/profile/";

/// Characters left alone by `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Feed,
    Profile { author_name: String },
}

impl Route {
    /// `/profile/<name>` is a profile, anything else falls back to the feed.
    pub fn parse(path: &str) -> Self {
        match raw_author_name(path) {
            Some(raw) => Self::Profile {
                author_name: percent_decode_str(raw).decode_utf8_lossy().into_owned(),
            },
            None => Self::Feed,
        }
    }
}

/// Route parameters for `path`, still percent-encoded.
pub fn params(path: &str) -> HashMap<&'static str, String> {
    let mut params = HashMap::new();
    if let Some(raw) = raw_author_name(path) {
        params.insert(AUTHOR_NAME_PARAM, raw.to_owned());
    }
    params
}

/// Link target for an author's profile page.
pub fn profile_path(author_name: &str) -> String {
    format!(
        "{}{}",
        PROFILE_PREFIX,
        utf8_percent_encode(author_name, COMPONENT)
    )
}

fn raw_author_name(path: &str) -> Option<&str> {
    path.strip_prefix(PROFILE_PREFIX)
        .filter(|rest| !rest.is_empty())
}

/// Visited locations plus a cursor. Back and forward notify subscribers; assignment does not.
#[derive(Debug)]
pub struct History {
    entries: Vec<String>,
    index: usize,
    popstate: watch::Sender<String>,
}

impl History {
    pub fn new(initial: &str) -> Self {
        let (popstate, _) = watch::channel(initial.to_owned());
        Self {
            entries: vec![initial.to_owned()],
            index: 0,
            popstate,
        }
    }

    pub fn location(&self) -> &str {
        &self.entries[self.index]
    }

    /// Full navigation: drops forward entries and makes `path` current.
    pub fn assign(&mut self, path: &str) {
        self.entries.truncate(self.index + 1);
        self.entries.push(path.to_owned());
        self.index = self.entries.len() - 1;
    }

    pub fn back(&mut self) -> bool {
        if self.index == 0 {
            return false;
        }
        self.index -= 1;
        self.pop_state();
        true
    }

    pub fn forward(&mut self) -> bool {
        if self.index + 1 >= self.entries.len() {
            return false;
        }
        self.index += 1;
        self.pop_state();
        true
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.popstate.subscribe()
    }

    fn pop_state(&self) {
        tracing::debug!("popstate {}", self.location());
        self.popstate.send_replace(self.location().to_owned());
    }
}

/// Current path as reactive state, kept in sync with back/forward navigation.
#[derive(Debug)]
pub struct PathRouter {
    path: watch::Sender<String>,
    popstate: watch::Receiver<String>,
}

impl PathRouter {
    /// Reads the active location once and listens for later pop events.
    pub fn new(history: &History) -> Self {
        let (path, _) = watch::channel(history.location().to_owned());
        Self {
            path,
            popstate: history.subscribe(),
        }
    }

    pub fn path(&self) -> String {
        self.path.borrow().clone()
    }

    pub fn route(&self) -> Route {
        Route::parse(&self.path.borrow())
    }

    pub fn params(&self) -> HashMap<&'static str, String> {
        params(&self.path.borrow())
    }

    /// Receiver that sees every path change made by this router.
    pub fn watch(&self) -> watch::Receiver<String> {
        self.path.subscribe()
    }

    /// Applies a pending back/forward event. Returns true when the path changed.
    pub fn sync(&mut self) -> bool {
        if !self.popstate.has_changed().unwrap_or(false) {
            return false;
        }
        let location = self.popstate.borrow_and_update().clone();
        self.path.send_if_modified(|path| {
            if *path == location {
                return false;
            }
            *path = location;
            true
        })
    }
}
