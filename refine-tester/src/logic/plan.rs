use anyhow::{Context, Result};
use refine_engine::{
    DataLoader, Mechanic, ModifierChoice, ModifierCombo, ProbabilityModel, RefineEngine,
    TrackChoices,
};

/// One mechanic configuration to evaluate, with its published average when
/// the tables carry one.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub name: String,
    pub mechanic: Mechanic,
    pub reference: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    pub levels: Vec<u32>,
    pub stages: Vec<u32>,
    pub enhanced: bool,
    /// Fixed catalyst stack count; `None` stacks to each level's bucket cap.
    pub catalyst_stacks: Option<u32>,
}

/// Single-track choice for `combo`, stacking catalysts to `catalyst_stacks`
/// or, when unset, to the level's bucket cap.
pub fn single_track_choice(
    model: &ProbabilityModel,
    level: u32,
    combo: ModifierCombo,
    catalyst_stacks: Option<u32>,
) -> Result<ModifierChoice> {
    let choice = match catalyst_stacks {
        Some(stacks) if combo.uses_catalyst() => {
            ModifierChoice::new(true, stacks, combo.uses_bonus_item())
        }
        _ => ModifierChoice::saturated(model, level, combo)?,
    };
    Ok(choice)
}

/// Expand levels and stages into one scenario per modifier combination.
pub fn build_scenarios<L: DataLoader>(
    engine: &RefineEngine<L>,
    options: &PlanOptions,
) -> Result<Vec<Scenario>> {
    let mut scenarios = Vec::new();
    let model = engine.probability_model();

    for &level in &options.levels {
        model
            .tier(level)
            .with_context(|| format!("level {level} cannot be evaluated"))?;
        for combo in ModifierCombo::ALL {
            let saturated = ModifierChoice::saturated(model, level, combo)?;
            let choice = single_track_choice(model, level, combo, options.catalyst_stacks)?;
            let reference = model
                .reference(level)
                .filter(|_| choice == saturated)
                .map(|row| row.for_combo(combo));
            let mechanic = Mechanic::single(level, choice);
            scenarios.push(Scenario {
                name: mechanic.to_string(),
                mechanic,
                reference,
            });
        }
    }

    let advanced = engine.advanced_model();
    for &stage in &options.stages {
        let mut variants = vec![false];
        if options.enhanced
            && advanced
                .has_enhanced(stage)
                .with_context(|| format!("stage {stage} cannot be evaluated"))?
        {
            variants.push(true);
        }
        advanced
            .stage(stage)
            .with_context(|| format!("stage {stage} cannot be evaluated"))?;
        for enhanced in variants {
            for combo in ModifierCombo::ALL {
                let choice =
                    ModifierChoice::new(combo.uses_catalyst(), 0, combo.uses_bonus_item());
                let mechanic = Mechanic::dual(stage, enhanced, TrackChoices::uniform(choice));
                scenarios.push(Scenario {
                    name: mechanic.to_string(),
                    mechanic,
                    reference: None,
                });
            }
        }
    }

    Ok(scenarios)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> RefineEngine<refine_engine::EmbeddedData> {
        RefineEngine::embedded().unwrap()
    }

    #[test]
    fn saturated_choices_carry_reference_averages() {
        let options = PlanOptions {
            levels: vec![11],
            ..PlanOptions::default()
        };
        let scenarios = build_scenarios(&engine(), &options).unwrap();
        assert_eq!(scenarios.len(), 4);
        assert!(scenarios.iter().all(|s| s.reference.is_some()));
        assert_eq!(scenarios[0].name, "level 11 [none]");
    }

    #[test]
    fn custom_stacks_drop_reference_for_catalyst_combos() {
        let options = PlanOptions {
            levels: vec![11],
            catalyst_stacks: Some(5),
            ..PlanOptions::default()
        };
        let scenarios = build_scenarios(&engine(), &options).unwrap();
        let with_reference = scenarios.iter().filter(|s| s.reference.is_some()).count();
        assert_eq!(with_reference, 2);
    }

    #[test]
    fn enhanced_variants_only_where_available() {
        let options = PlanOptions {
            stages: vec![1, 2],
            enhanced: true,
            ..PlanOptions::default()
        };
        let scenarios = build_scenarios(&engine(), &options).unwrap();
        assert_eq!(scenarios.len(), 12);
        assert!(scenarios.iter().all(|s| s.reference.is_none()));
    }

    #[test]
    fn unknown_levels_and_stages_fail_planning() {
        let levels = PlanOptions {
            levels: vec![40],
            ..PlanOptions::default()
        };
        assert!(build_scenarios(&engine(), &levels).is_err());
        let stages = PlanOptions {
            stages: vec![9],
            ..PlanOptions::default()
        };
        assert!(build_scenarios(&engine(), &stages).is_err());
    }
}
