//! Prompt assembly for reasoning requests.

use std::fmt::Write;

use npc_core::Trigger;

use crate::decision::DecisionContext;

/// Most nearby agents listed in a prompt.
const MAX_NEARBY_LINES: usize = 6;

/// Folds the decision context and social state into the situation summary
/// sent as `prompt_context`.
pub fn situation_prompt(
    ctx: &DecisionContext,
    recent_chat: &[String],
    memories: &[String],
    context_blocks: &[String],
) -> String {
    let agent = &ctx.agent;
    let stats = agent.stats;
    let mut out = String::with_capacity(512);

    let _ = writeln!(
        out,
        "You are {} ({}), a {} at {}.",
        agent.name, agent.id, agent.role, agent.position
    );
    let _ = writeln!(
        out,
        "It is {} of day {} ({}).",
        ctx.slot,
        ctx.clock.day + 1,
        ctx.season
    );
    let _ = writeln!(
        out,
        "Health {}%, hunger {}, energy {}, food {}, coins {}.",
        stats.health_percent(),
        stats.hunger,
        stats.energy,
        agent.inventory.food,
        agent.inventory.coins
    );
    if ctx.in_combat {
        let _ = writeln!(out, "You are in combat.");
    }
    if let Some(home) = ctx.home {
        let _ = writeln!(out, "Your home is at {}.", home);
    }
    if let Some(poi) = &ctx.nearest_poi {
        let _ = writeln!(out, "Nearest landmark: {} ({}) at {}.", poi.name, poi.kind, poi.position);
    }

    if !ctx.nearby.is_empty() {
        let _ = writeln!(out, "Nearby:");
        for row in ctx.nearby.iter().take(MAX_NEARBY_LINES) {
            let doing = row
                .current_action
                .map_or_else(|| "idle".to_string(), |action| action.to_string());
            let _ = writeln!(
                out,
                "- {} ({}, {}), {} tiles away, {}{}{}",
                row.name,
                row.id,
                row.role,
                row.distance,
                doing,
                if row.is_human() { ", a traveller" } else { "" },
                if row.hostile { ", hostile" } else { "" },
            );
        }
    }

    if let Some(speaker) = ctx.addressed_by {
        let _ = writeln!(out, "Agent {} just spoke to you.", speaker);
    }
    section(&mut out, "Recently overheard", recent_chat);
    section(&mut out, "You remember", memories);
    for block in context_blocks.iter().filter(|block| !block.trim().is_empty()) {
        let _ = writeln!(out, "{}", block.trim_end());
    }
    out
}

/// One line per trigger, oldest first. `None` when nothing fired.
pub fn trigger_context(triggers: &[Trigger]) -> Option<String> {
    if triggers.is_empty() {
        return None;
    }
    let lines: Vec<String> = triggers
        .iter()
        .map(|trigger| format!("[tick {}] {}: {}", trigger.tick, trigger.kind, trigger.description))
        .collect();
    Some(lines.join("\n"))
}

fn section(out: &mut String, title: &str, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    let _ = writeln!(out, "{}:", title);
    for line in lines {
        let _ = writeln!(out, "- {}", line);
    }
}
