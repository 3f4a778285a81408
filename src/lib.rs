// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! A marker-grid slicing and playback engine for mono recordings: place or
//! auto-detect slice markers, quantize them to a tempo grid, derive
//! contiguous sampler regions, and preview them through a real-time output
//! stream.

pub mod buffer;
pub mod config;
pub mod decode;
pub mod detect;
pub mod engine;
pub mod grid;
pub mod markers;
pub mod playback;
pub mod playsync;
pub mod regions;
pub mod util;

#[cfg(test)]
pub mod testutil;
