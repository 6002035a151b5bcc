//! 内置棋盘目录。

use once_cell::sync::Lazy;

use super::board::{BoardDefinition, Orientation, StartOption};

use Orientation::{Horizontal, Vertical};

struct Entry {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    layout: &'static [&'static str],
    starts: &'static [(Orientation, &'static [usize])],
}

const ENTRIES: &[Entry] = &[
    Entry {
        id: "classic_cross",
        name: "Classic Cross",
        description: "A symmetrical 11x11 cross. Balanced gameplay with strategic voids in the corners.",
        layout: &[
            "   XXXXX   ",
            "   XXXXX   ",
            "   XXXXX   ",
            "XXXXXXXXXXX",
            "XXXXXXXXXXX",
            "XXXXX XXXXX",
            "XXXXXXXXXXX",
            "XXXXXXXXXXX",
            "   XXXXX   ",
            "   XXXXX   ",
            "   XXXXX   ",
        ],
        starts: &[(Horizontal, &[3, 4, 6, 7]), (Vertical, &[3, 4, 6, 7])],
    },
    Entry {
        id: "hollow_box",
        name: "The Hollow Box",
        description: "A 9x9 grid with a 3x3 void in the center. Forces players onto the edges.",
        layout: &[
            "XXXXXXXXX",
            "XXXXXXXXX",
            "XXXXXXXXX",
            "XXX   XXX",
            "XXX   XXX",
            "XXX   XXX",
            "XXXXXXXXX",
            "XXXXXXXXX",
            "XXXXXXXXX",
        ],
        starts: &[(Horizontal, &[0, 1, 2]), (Vertical, &[0, 1, 2])],
    },
    Entry {
        id: "the_arena",
        name: "The Arena",
        description: "A compact 7x7 square. Fast-paced and brutal.",
        layout: &[
            "XXXXXXX", "XXXXXXX", "XXXXXXX", "XXXXXXX", "XXXXXXX", "XXXXXXX", "XXXXXXX",
        ],
        starts: &[(Horizontal, &[3]), (Vertical, &[3])],
    },
    Entry {
        id: "hourglass",
        name: "The Hourglass",
        description: "A converging layout that funnels players into a choke point in the center.",
        layout: &[
            "XXXXXXXXXXX",
            "XXXXXXXXXXX",
            " XXXXXXXXX ",
            "  XXXXXXX  ",
            "   XXXXX   ",
            "    XXX    ",
            "   XXXXX   ",
            "  XXXXXXX  ",
            " XXXXXXXXX ",
            "XXXXXXXXXXX",
            "XXXXXXXXXXX",
        ],
        starts: &[(Horizontal, &[0, 10]), (Vertical, &[5])],
    },
    Entry {
        id: "the_stairs",
        name: "The Stairs",
        description: "A jagged ascent that opens up towards the bottom-right.",
        layout: &[
            "       XX",
            "      XXX",
            "     XXXX",
            "    XXXXX",
            "   XXXXXX",
            "  XXXXXXX",
            " XXXXXXXX",
            "XXXXXXXXX",
            "XXXXXXXXX",
        ],
        starts: &[(Horizontal, &[8]), (Vertical, &[8])],
    },
];

static BOARDS: Lazy<Vec<BoardDefinition>> = Lazy::new(|| {
    ENTRIES
        .iter()
        .map(|entry| {
            BoardDefinition::new(
                entry.id,
                entry.name,
                entry.layout.iter().map(|row| row.to_string()).collect(),
                entry
                    .starts
                    .iter()
                    .map(|(orientation, indices)| StartOption::new(*orientation, *indices))
                    .collect(),
            )
            .with_description(entry.description)
        })
        .collect()
});

pub fn boards() -> &'static [BoardDefinition] {
    &BOARDS
}

pub fn find(id: &str) -> Option<&'static BoardDefinition> {
    BOARDS.iter().find(|board| board.id == id)
}

/// 默认棋盘（目录中的第一个）。
pub fn default_board() -> &'static BoardDefinition {
    &BOARDS[0]
}
