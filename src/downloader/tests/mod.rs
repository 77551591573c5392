use super::*;
use crate::compiler::DownloadRequest;
use crate::downloader::test_helpers::{
    Script, ScriptedEngine, StubTranscriber, create_downloader_with, create_test_downloader,
    media_item, wait_for_status, wait_for_terminal,
};
use crate::engine::{EngineError, EngineOutcome, EntryOutcome};
use crate::types::{ErrorKind, JobResult, Status};

mod lifecycle;
