// SPDX-License-Identifier: MIT

pub mod bitmap;
pub mod time;
