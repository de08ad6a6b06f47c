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

use std::path::Path;

/// Extracts a displayable file name from a path, returning a fallback if the name is unreadable.
pub fn filename_display(path: &Path) -> &str {
    path.file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("unreadable file name")
}

/// Outputs a frame count at the given rate in a minutes:seconds format.
pub fn frames_minutes_seconds(frames: u64, sample_rate: u32) -> String {
    let total = frames / u64::from(sample_rate.max(1));
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use crate::util::{filename_display, frames_minutes_seconds};

    #[test]
    fn test_frames_minutes_seconds() {
        assert_eq!("0:00", frames_minutes_seconds(0, 48000));
        assert_eq!("0:05", frames_minutes_seconds(5 * 48000 + 100, 48000));
        assert_eq!("1:00", frames_minutes_seconds(60 * 44100, 44100));
        assert_eq!("60:06", frames_minutes_seconds(3606 * 1000, 1000));
        assert_eq!("0:10", frames_minutes_seconds(10, 0));
    }

    #[test]
    fn test_filename_display() {
        assert_eq!("Kick 1_1.wav", filename_display(Path::new("/kit/Kick 1_1.wav")));
        assert_eq!("unreadable file name", filename_display(Path::new("/")));
    }
}
