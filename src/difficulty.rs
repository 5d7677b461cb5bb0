use rand::seq::SliceRandom;
use rand::Rng;

/// How board symbols drift during the input phase. Presentation hint only;
/// the engine forwards it and never branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum MovementType {
    None,
    Slow,
    Moderate,
    Fast,
    Wander,
}

/// Extra visual treatment applied to the board. Presentation hint only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SpecialEffect {
    None,
    Ghost,
    Spin,
    Pulse,
}

/// Per-level tuning derived purely from the level number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyConfig {
    pub pool_size: usize,
    pub sequence_length: usize,
    pub movement: MovementType,
    pub effect: SpecialEffect,
}

/// Maps a level to its difficulty tuning. Total over `level >= 1`; fixed
/// table through level 15, procedural beyond (the only place `rng` is used,
/// so seeded runs reproduce the same late-game configs).
pub fn config_for(level: u32, rng: &mut impl Rng) -> DifficultyConfig {
    let fixed = |pool_size, sequence_length, movement, effect| DifficultyConfig {
        pool_size,
        sequence_length,
        movement,
        effect,
    };

    match level {
        1..=2 => fixed(8, level as usize, MovementType::None, SpecialEffect::None),
        3..=4 => fixed(10, level as usize, MovementType::None, SpecialEffect::None),
        5 => fixed(10, 3, MovementType::None, SpecialEffect::None),
        6..=8 => fixed(15, 5, MovementType::Slow, SpecialEffect::None),
        9 => fixed(15, 6, MovementType::Moderate, SpecialEffect::Ghost),
        10 => fixed(15, 6, MovementType::Fast, SpecialEffect::Spin),
        11..=15 => fixed(20, 7, MovementType::Wander, SpecialEffect::Pulse),
        _ => {
            let sequence_length = 7 + (level as usize).saturating_sub(11) / 2;
            let pool_size = if level % 2 == 0 { 15 } else { 20 };
            let movement = *[MovementType::Moderate, MovementType::Fast, MovementType::Wander]
                .choose(rng)
                .unwrap_or(&MovementType::Fast);
            let effect = *[SpecialEffect::Ghost, SpecialEffect::Spin, SpecialEffect::Pulse]
                .choose(rng)
                .unwrap_or(&SpecialEffect::None);
            DifficultyConfig {
                pool_size,
                sequence_length,
                movement,
                effect,
            }
        }
    }
}
