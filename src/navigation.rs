use url::Url;

use crate::events::{Clock, EventRecord, EventSink, dispatch_record, frame_id};

pub mod topics {
    pub const ON_BEFORE_NAVIGATE: &str = "webNavigation.onBeforeNavigate";
    pub const ON_COMMITTED: &str = "webNavigation.onCommitted";
    pub const ON_REFERENCE_FRAGMENT_UPDATED: &str = "webNavigation.onReferenceFragmentUpdated";
    pub const ON_HISTORY_STATE_UPDATED: &str = "webNavigation.onHistoryStateUpdated";
    pub const ON_DOM_CONTENT_LOADED: &str = "webNavigation.onDOMContentLoaded";
    pub const ON_COMPLETED: &str = "webNavigation.onCompleted";
    pub const ON_CREATED_NAVIGATION_TARGET: &str = "webNavigation.onCreatedNavigationTarget";
    pub const ON_ERROR_OCCURRED: &str = "webNavigation.onErrorOccurred";
    pub const ON_TAB_REPLACED: &str = "webNavigation.onTabReplaced";
}

pub mod keys {
    pub const TAB_ID: &str = "tabId";
    pub const URL: &str = "url";
    pub const PROCESS_ID: &str = "processId";
    pub const FRAME_ID: &str = "frameId";
    pub const PARENT_FRAME_ID: &str = "parentFrameId";
    pub const TRANSITION_TYPE: &str = "transitionType";
    pub const TRANSITION_QUALIFIERS: &str = "transitionQualifiers";
    pub const SOURCE_TAB_ID: &str = "sourceTabId";
    pub const SOURCE_PROCESS_ID: &str = "sourceProcessId";
    pub const SOURCE_FRAME_ID: &str = "sourceFrameId";
    pub const ERROR: &str = "error";
    pub const REPLACED_TAB_ID: &str = "replacedTabId";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabContext {
    pub tab_id: i32,
    pub process_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRef {
    pub frame_id: i64,
    pub is_main_frame: bool,
}

impl FrameRef {
    #[must_use]
    pub const fn main(frame_id: i64) -> Self {
        Self {
            frame_id,
            is_main_frame: true,
        }
    }

    #[must_use]
    pub const fn sub(frame_id: i64) -> Self {
        Self {
            frame_id,
            is_main_frame: false,
        }
    }

    fn host_id(self) -> i64 {
        i64::from(frame_id(self.is_main_frame, self.frame_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreTransition {
    Link,
    Typed,
    AutoBookmark,
    AutoSubframe,
    ManualSubframe,
    Generated,
    AutoToplevel,
    FormSubmit,
    Reload,
    Keyword,
    KeywordGenerated,
}

impl CoreTransition {
    /// Name reported to listeners. `AutoToplevel` keeps its older
    /// `start_page` name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Link => "link",
            Self::Typed => "typed",
            Self::AutoBookmark => "auto_bookmark",
            Self::AutoSubframe => "auto_subframe",
            Self::ManualSubframe => "manual_subframe",
            Self::Generated => "generated",
            Self::AutoToplevel => "start_page",
            Self::FormSubmit => "form_submit",
            Self::Reload => "reload",
            Self::Keyword => "keyword",
            Self::KeywordGenerated => "keyword_generated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransitionQualifier {
    ClientRedirect,
    ServerRedirect,
    ForwardBack,
    FromAddressBar,
}

impl TransitionQualifier {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClientRedirect => "client_redirect",
            Self::ServerRedirect => "server_redirect",
            Self::ForwardBack => "forward_back",
            Self::FromAddressBar => "from_address_bar",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTransition {
    pub core: CoreTransition,
    pub qualifiers: Vec<TransitionQualifier>,
}

impl PageTransition {
    #[must_use]
    pub fn new(core: CoreTransition) -> Self {
        Self {
            core,
            qualifiers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, qualifier: TransitionQualifier) -> Self {
        self.qualifiers.push(qualifier);
        self
    }

    fn qualifier_names(&self) -> Vec<&'static str> {
        let mut qualifiers = self.qualifiers.clone();
        qualifiers.sort();
        qualifiers.dedup();
        qualifiers.into_iter().map(TransitionQualifier::as_str).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitKind {
    Committed,
    ReferenceFragmentUpdated,
    HistoryStateUpdated,
}

impl CommitKind {
    fn topic(self) -> &'static str {
        match self {
            Self::Committed => topics::ON_COMMITTED,
            Self::ReferenceFragmentUpdated => topics::ON_REFERENCE_FRAGMENT_UPDATED,
            Self::HistoryStateUpdated => topics::ON_HISTORY_STATE_UPDATED,
        }
    }
}

pub struct NavigationEvents<'a> {
    sink: &'a dyn EventSink,
    clock: &'a dyn Clock,
}

impl<'a> NavigationEvents<'a> {
    pub fn new(sink: &'a dyn EventSink, clock: &'a dyn Clock) -> Self {
        Self { sink, clock }
    }

    fn frame_record(tab: TabContext, frame: FrameRef, url: &Url) -> EventRecord {
        EventRecord::new()
            .int(keys::TAB_ID, i64::from(tab.tab_id))
            .string(keys::URL, url.as_str())
            .int(keys::PROCESS_ID, i64::from(tab.process_id))
            .int(keys::FRAME_ID, frame.host_id())
    }

    fn send(&self, topic: &str, record: EventRecord, url: Option<&Url>) {
        dispatch_record(self.sink, self.clock, topic, record, url);
    }

    pub fn on_before_navigate(
        &self,
        tab: TabContext,
        frame: FrameRef,
        parent: FrameRef,
        url: &Url,
    ) {
        let record =
            Self::frame_record(tab, frame, url).int(keys::PARENT_FRAME_ID, parent.host_id());
        self.send(topics::ON_BEFORE_NAVIGATE, record, Some(url));
    }

    pub fn on_committed(
        &self,
        kind: CommitKind,
        tab: TabContext,
        frame: FrameRef,
        url: &Url,
        transition: &PageTransition,
    ) {
        let record = Self::frame_record(tab, frame, url)
            .string(keys::TRANSITION_TYPE, transition.core.as_str())
            .strings(keys::TRANSITION_QUALIFIERS, transition.qualifier_names());
        self.send(kind.topic(), record, Some(url));
    }

    pub fn on_dom_content_loaded(&self, tab: TabContext, frame: FrameRef, url: &Url) {
        self.send(
            topics::ON_DOM_CONTENT_LOADED,
            Self::frame_record(tab, frame, url),
            Some(url),
        );
    }

    pub fn on_completed(&self, tab: TabContext, frame: FrameRef, url: &Url) {
        self.send(
            topics::ON_COMPLETED,
            Self::frame_record(tab, frame, url),
            Some(url),
        );
    }

    pub fn on_created_navigation_target(
        &self,
        source: TabContext,
        source_frame: FrameRef,
        target_tab_id: i32,
        target_url: &Url,
    ) {
        let record = EventRecord::new()
            .int(keys::SOURCE_TAB_ID, i64::from(source.tab_id))
            .int(keys::SOURCE_PROCESS_ID, i64::from(source.process_id))
            .int(keys::SOURCE_FRAME_ID, source_frame.host_id())
            .string(keys::URL, target_url.as_str())
            .int(keys::TAB_ID, i64::from(target_tab_id));
        self.send(topics::ON_CREATED_NAVIGATION_TARGET, record, Some(target_url));
    }

    pub fn on_error_occurred(&self, tab: TabContext, frame: FrameRef, url: &Url, error: &str) {
        let record = Self::frame_record(tab, frame, url).string(keys::ERROR, error);
        self.send(topics::ON_ERROR_OCCURRED, record, Some(url));
    }

    pub fn on_tab_replaced(&self, replaced_tab_id: i32, tab_id: i32) {
        let record = EventRecord::new()
            .int(keys::REPLACED_TAB_ID, i64::from(replaced_tab_id))
            .int(keys::TAB_ID, i64::from(tab_id));
        self.send(topics::ON_TAB_REPLACED, record, None);
    }
}
