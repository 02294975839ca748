// Copyright 2026 Tobin Edwards
//
//    Licensed under the Apache License, Version 2.0 (the "License");
//    you may not use this file except in compliance with the License.
//    You may obtain a copy of the License at
//
//        http://www.apache.org/licenses/LICENSE-2.0
//
//    Unless required by applicable law or agreed to in writing, software
//    distributed under the License is distributed on an "AS IS" BASIS,
//    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//    See the License for the specific language governing permissions and
//    limitations under the License.

//! Move history and navigation core of a chess study board
//!
//! A `Study` keeps one linear line of moves and a pointer into it. Moves
//! are played from whatever position the pointer shows, overwriting the
//! rest of the line. Navigation never changes the line. Analysis of the
//! displayed position is fetched asynchronously from an external service
//! and merged back when the owner drains it.

mod analysis;
mod board;
mod config;
mod history;
mod study;

pub use analysis::*;
pub use board::*;
pub use config::*;
pub use history::*;
pub use study::*;
