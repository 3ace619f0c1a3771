// Integration test suite for the chat server.
//
// Organized into focused modules by feature area; all share the common::
// harness for server lifecycle and TCP framing.

mod common;

mod auth;
mod chat;
mod history;
