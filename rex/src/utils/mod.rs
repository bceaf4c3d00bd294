// SPDX-License-Identifier: MIT

pub mod log;
pub mod progress;
pub mod string;
