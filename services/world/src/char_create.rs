//! char_create
//!
//! Static race/class tables backing character creation: which combos the
//! realm accepts, where each race spawns, which spells and gear a fresh
//! character starts with, and the faction split chat and mail checks
//! consult.

use aegis_game::characters::{ActionButton, NewCharacter, StarterKit};

pub mod race {
    pub const HUMAN: u8 = 1;
    pub const ORC: u8 = 2;
    pub const DWARF: u8 = 3;
    pub const NIGHT_ELF: u8 = 4;
    pub const UNDEAD: u8 = 5;
    pub const TAUREN: u8 = 6;
    pub const GNOME: u8 = 7;
    pub const TROLL: u8 = 8;
    pub const BLOOD_ELF: u8 = 10;
    pub const DRAENEI: u8 = 11;
}

pub mod class {
    pub const WARRIOR: u8 = 1;
    pub const PALADIN: u8 = 2;
    pub const HUNTER: u8 = 3;
    pub const ROGUE: u8 = 4;
    pub const PRIEST: u8 = 5;
    pub const SHAMAN: u8 = 7;
    pub const MAGE: u8 = 8;
    pub const WARLOCK: u8 = 9;
    pub const DRUID: u8 = 11;
}

/// Which side of the war a race fights on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Faction {
    Alliance,
    Horde,
}

const ALLIANCE_MASK: u16 = (1 << race::HUMAN)
    | (1 << race::DWARF)
    | (1 << race::NIGHT_ELF)
    | (1 << race::GNOME)
    | (1 << race::DRAENEI);
const HORDE_MASK: u16 = (1 << race::ORC)
    | (1 << race::UNDEAD)
    | (1 << race::TAUREN)
    | (1 << race::TROLL)
    | (1 << race::BLOOD_ELF);

pub fn faction_of(race: u8) -> Option<Faction> {
    let bit = 1u16.checked_shl(u32::from(race))?;
    if ALLIANCE_MASK & bit != 0 {
        Some(Faction::Alliance)
    } else if HORDE_MASK & bit != 0 {
        Some(Faction::Horde)
    } else {
        None
    }
}

pub fn same_faction(a: u8, b: u8) -> bool {
    matches!((faction_of(a), faction_of(b)), (Some(x), Some(y)) if x == y)
}

/// `(race, classes)` rows of the combination table.
const VALID_COMBOS: &[(u8, &[u8])] = &[
    (race::HUMAN, &[class::WARRIOR, class::PALADIN, class::ROGUE, class::PRIEST, class::MAGE, class::WARLOCK]),
    (race::ORC, &[class::WARRIOR, class::HUNTER, class::ROGUE, class::SHAMAN, class::WARLOCK]),
    (race::DWARF, &[class::WARRIOR, class::PALADIN, class::HUNTER, class::ROGUE, class::PRIEST]),
    (race::NIGHT_ELF, &[class::WARRIOR, class::HUNTER, class::ROGUE, class::PRIEST, class::DRUID]),
    (race::UNDEAD, &[class::WARRIOR, class::ROGUE, class::PRIEST, class::MAGE, class::WARLOCK]),
    (race::TAUREN, &[class::WARRIOR, class::HUNTER, class::SHAMAN, class::DRUID]),
    (race::GNOME, &[class::WARRIOR, class::ROGUE, class::MAGE, class::WARLOCK]),
    (race::TROLL, &[class::WARRIOR, class::HUNTER, class::ROGUE, class::PRIEST, class::SHAMAN, class::MAGE]),
    (race::BLOOD_ELF, &[class::PALADIN, class::HUNTER, class::ROGUE, class::PRIEST, class::MAGE, class::WARLOCK]),
    (race::DRAENEI, &[class::WARRIOR, class::PALADIN, class::HUNTER, class::PRIEST, class::SHAMAN, class::MAGE]),
];

pub fn valid_combo(race: u8, class: u8) -> bool {
    VALID_COMBOS
        .iter()
        .any(|(r, classes)| *r == race && classes.contains(&class))
}

/// `(map, zone, x, y, z, orientation)` spawn points per race.
fn start_location(race: u8) -> Option<(u32, u32, f32, f32, f32, f32)> {
    Some(match race {
        race::HUMAN => (0, 12, -8949.95, -132.493, 83.5312, 0.0),
        race::DWARF | race::GNOME => (0, 1, -6240.32, 331.033, 382.758, 6.17716),
        race::NIGHT_ELF => (1, 141, 10311.3, 832.463, 1326.41, 5.69632),
        race::UNDEAD => (0, 85, 1676.35, 1677.45, 121.67, 2.70526),
        race::ORC | race::TROLL => (1, 14, -618.518, -4251.67, 38.718, 0.0),
        race::TAUREN => (1, 215, -2917.58, -257.98, 52.9968, 0.0),
        race::BLOOD_ELF => (530, 3431, 10349.6, -6357.29, 33.4026, 5.31605),
        race::DRAENEI => (530, 3526, -3961.64, -13931.2, 100.615, 2.08364),
        _ => return None,
    })
}

/// Spell 6603 is the plain melee attack every class starts with.
const ATTACK: u32 = 6603;

fn starter_spells(class: u8) -> Option<Vec<u32>> {
    Some(match class {
        class::WARRIOR => vec![ATTACK, 78, 2457],
        class::PALADIN => vec![ATTACK, 635, 21084],
        class::HUNTER => vec![ATTACK, 75, 2973],
        class::ROGUE => vec![ATTACK, 1752, 2098],
        class::PRIEST => vec![ATTACK, 585, 2050],
        class::SHAMAN => vec![ATTACK, 403, 331],
        class::MAGE => vec![ATTACK, 133, 168],
        class::WARLOCK => vec![ATTACK, 686, 687],
        class::DRUID => vec![ATTACK, 5176, 5185],
        _ => return None,
    })
}

/// Hearthstone plus a ration stack, the same for everyone.
const COMMON_ITEMS: &[(u32, u8)] = &[(6948, 1), (117, 4)];

fn starter_weapon(class: u8) -> (u32, u8) {
    match class {
        class::WARRIOR => (25, 1),       // worn shortsword
        class::PALADIN => (2361, 1),     // battleworn hammer
        class::HUNTER => (37, 1),        // worn shortbow and axe come later
        class::ROGUE => (2092, 1),       // worn dagger
        class::PRIEST => (36, 1),        // worn mace
        class::SHAMAN => (36, 1),
        class::MAGE => (35, 1),          // bent staff
        class::WARLOCK => (2092, 1),
        class::DRUID => (3661, 1),       // handcrafted staff
        _ => (25, 1),
    }
}

/// Everything a valid `(race, class)` pair starts with, `None` for a
/// combination the table rejects.
pub fn starter_kit(race: u8, class: u8) -> Option<StarterKit> {
    if !valid_combo(race, class) {
        return None;
    }
    let (map, zone, x, y, z, orientation) = start_location(race)?;
    let spells = starter_spells(class)?;

    // the first real ability lands on the first action bar slot
    let action_buttons = spells
        .iter()
        .filter(|&&s| s != ATTACK)
        .take(2)
        .enumerate()
        .map(|(i, &spell)| ActionButton {
            button: i as u8,
            action: spell,
            kind: 0,
        })
        .collect();

    let mut items = COMMON_ITEMS.to_vec();
    items.push(starter_weapon(class));

    Some(StarterKit {
        map,
        zone,
        position: (x, y, z),
        orientation,
        spells,
        action_buttons,
        items,
    })
}

/// Name rules: 2–12 letters, nothing else.
pub fn valid_name(name: &str) -> bool {
    (2..=12).contains(&name.chars().count()) && name.chars().all(|c| c.is_ascii_alphabetic())
}

/// Full validation of a creation request, short of store checks.
pub fn validate(request: &NewCharacter) -> Result<(), CreateRefusal> {
    if !valid_name(&request.name) {
        return Err(CreateRefusal::BadName);
    }
    if !valid_combo(request.race, request.class) {
        return Err(CreateRefusal::BadCombo);
    }
    Ok(())
}

/// Why a creation request was refused before touching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateRefusal {
    BadName,
    BadCombo,
}

/// The intro cinematic to play on a character's very first world entry.
pub fn intro_cinematic(race: u8) -> Option<u32> {
    Some(match race {
        race::HUMAN => 81,
        race::ORC | race::TROLL => 21,
        race::DWARF | race::GNOME => 41,
        race::NIGHT_ELF => 61,
        race::UNDEAD => 2,
        race::TAUREN => 141,
        race::BLOOD_ELF => 163,
        race::DRAENEI => 164,
        _ => return None,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classic_cross_faction_combos_are_rejected() {
        assert!(valid_combo(race::HUMAN, class::PALADIN));
        assert!(!valid_combo(race::HUMAN, class::SHAMAN));
        assert!(!valid_combo(race::ORC, class::PALADIN));
        assert!(valid_combo(race::TAUREN, class::DRUID));
        assert!(!valid_combo(race::TAUREN, class::MAGE));
    }

    #[test]
    fn every_valid_combo_yields_a_full_kit() {
        for (race, classes) in VALID_COMBOS {
            for class in *classes {
                let kit = starter_kit(*race, *class).unwrap();
                assert!(kit.spells.contains(&ATTACK));
                assert!(kit.spells.len() >= 2, "race {race} class {class}");
                assert!(!kit.action_buttons.is_empty());
                assert!(kit.items.len() >= 2);
            }
        }
        assert!(starter_kit(race::HUMAN, class::SHAMAN).is_none());
    }

    #[test]
    fn factions_split_down_the_middle() {
        assert_eq!(faction_of(race::HUMAN), Some(Faction::Alliance));
        assert_eq!(faction_of(race::BLOOD_ELF), Some(Faction::Horde));
        assert_eq!(faction_of(9), None);
        assert!(same_faction(race::DWARF, race::DRAENEI));
        assert!(!same_faction(race::DWARF, race::ORC));
    }

    #[test]
    fn names_are_plain_words() {
        assert!(valid_name("Arthas"));
        assert!(!valid_name("A"));
        assert!(!valid_name("toolongofaname"));
        assert!(!valid_name("Bad Name"));
        assert!(!valid_name("Xx1337xX"));
    }
}
