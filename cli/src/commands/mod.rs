mod food;
mod helpers;
mod log;
mod overview;
mod recipe;
mod sheet;
mod target;
mod weight;

pub(crate) use food::{cmd_food_add, cmd_food_list, cmd_food_remove};
pub(crate) use log::cmd_log;
pub(crate) use overview::cmd_overview;
pub(crate) use recipe::{
    cmd_draft_clear, cmd_draft_ingredient, cmd_draft_instruction, cmd_draft_show, cmd_draft_tag,
    cmd_recipe_list, cmd_recipe_remove, cmd_recipe_save, cmd_recipe_show, cmd_tag_add,
    cmd_tag_list, cmd_tag_remove,
};
pub(crate) use sheet::{cmd_cache_clear, cmd_sheet_push, cmd_sheet_show};
pub(crate) use target::{cmd_target_plan, cmd_target_set, cmd_target_show};
pub(crate) use weight::{cmd_weight_challenge, cmd_weight_history, cmd_weight_log};
