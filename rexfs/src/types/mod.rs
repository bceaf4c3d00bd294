// SPDX-License-Identifier: MIT

mod boot;
mod dir_entry;
mod entries;
mod flags;

pub use boot::*;
pub use dir_entry::*;
pub use entries::*;
pub use flags::*;
