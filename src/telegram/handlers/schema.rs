//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{HandlerExt, UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, Message};

use super::types::{ensure_user_exists, HandlerDeps, HandlerError, HandlerResult, UserInfo};
use crate::telegram::bot::Command;
use crate::telegram::conversation::Pending;
use crate::telegram::{
    admin, ban, broadcast, force_sub, links, settings, shortener, start, system, ui, users,
};

/// Creates the main dispatcher schema for the Telegram bot.
///
/// The same tree is used in production and in the routing tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_gate = deps.clone();
    let deps_commands = deps.clone();
    let deps_dialogs = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        .branch(
            Update::filter_message()
                .filter(|msg: Message| msg.chat.is_private())
                .filter_async(move |bot: Bot, msg: Message| {
                    let deps = deps_gate.clone();
                    async move { admit(&bot, &msg, &deps).await }
                })
                .branch(command_handler(deps_commands))
                .branch(dialog_handler(deps_dialogs)),
        )
        .branch(callback_handler(deps_callback))
}

/// Registers the sender and stops banned users before any command runs.
async fn admit(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> bool {
    let Some(info) = UserInfo::from_message(msg) else {
        return false;
    };
    ensure_user_exists(&deps.storage, &info).await;

    if deps.storage.banned.load().await.is_banned(info.user_id) {
        log::info!("Ignoring message from banned user {}", info.user_id);
        if let Err(e) = ui::send_html(bot, msg.chat.id, ban::BANNED_NOTICE, None).await {
            log::debug!("Ban notice not sent to {}: {}", info.user_id, e);
        }
        return false;
    }
    true
}

/// Handler for bot commands (/start, /genlink, /settings, etc.)
fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    dptree::entry()
        .filter_command::<Command>()
        .endpoint(move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("🎯 Received command: {:?} from {}", cmd, ui::sender_id(&msg));
                let result = run_command(&bot, &msg, &deps, cmd).await;
                if let Err(e) = &result {
                    log::error!("Command failed for {}: {}", ui::sender_id(&msg), e);
                }
                result
            }
        })
}

async fn run_command(bot: &Bot, msg: &Message, deps: &HandlerDeps, cmd: Command) -> HandlerResult {
    match cmd {
        Command::Start(payload) => start::handle_start(bot, msg, deps, payload.trim()).await,
        Command::Help => start::handle_help(bot, msg, deps).await,
        Command::Genlink => links::handle_genlink(bot, msg, deps).await,
        Command::Batchlink => links::handle_batchlink(bot, msg, deps).await,
        Command::Fsub => force_sub::handle_fsub(bot, msg, deps).await,
        Command::Settings => settings::handle_settings(bot, msg, deps).await,
        Command::Promote(args) => admin::handle_promote(bot, msg, deps, &args).await,
        Command::Demote(args) => admin::handle_demote(bot, msg, deps, &args).await,
        Command::Adminpanel => admin::handle_admin_panel(bot, msg, deps).await,
        Command::AdminLogs => admin::handle_admin_logs(bot, msg, deps).await,
        Command::Admins => admin::handle_admins(bot, msg, deps).await,
        Command::Ban(args) => ban::handle_ban(bot, msg, deps, &args).await,
        Command::Unban(args) => ban::handle_unban(bot, msg, deps, &args).await,
        Command::Users => users::handle_users(bot, msg, deps).await,
        Command::Broadcast => broadcast::handle_broadcast(bot, msg, deps).await,
        Command::BroadcastStatus => broadcast::handle_broadcast_status(bot, msg, deps).await,
        Command::Stats => system::handle_stats(bot, msg, deps).await,
        Command::Ping => system::handle_ping(bot, msg).await,
        Command::Alive => system::handle_alive(bot, msg, deps).await,
        Command::Restart => system::handle_restart(bot, msg, deps).await,
        Command::Update => system::handle_update(bot, msg, deps).await,
        Command::Shortener => shortener::handle_shortener(bot, msg, deps).await,
        Command::Shortlink => shortener::handle_shortlink(bot, msg, deps).await,
    }
}

/// Handler for plain messages answering an open dialog
fn dialog_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    dptree::entry().endpoint(move |bot: Bot, msg: Message| {
        let deps = deps.clone();
        async move {
            let user_id = ui::sender_id(&msg);
            let Some(pending) = deps.conversations.peek(user_id) else {
                return Ok(());
            };
            log::debug!("Dialog input from {}: {:?}", user_id, pending);

            let result = match pending {
                Pending::BatchFirst | Pending::BatchLast { .. } => {
                    links::on_batch_input(&bot, &msg, &deps, pending).await
                }
                Pending::ForceSubChannel => force_sub::on_channel_forward(&bot, &msg, &deps).await,
                Pending::Setting(field) => settings::on_setting_input(&bot, &msg, &deps, field).await,
                Pending::ShortenerToken { chat_id, message_id } => {
                    shortener::on_token_input(&bot, &msg, &deps, chat_id, message_id).await
                }
                Pending::ShortLink { chat_id, message_id } => {
                    shortener::on_shortlink_input(&bot, &msg, &deps, chat_id, message_id).await
                }
                Pending::Feedback => admin::on_feedback(&bot, &msg, &deps).await,
            };
            if let Err(e) = &result {
                log::error!("Dialog step failed for {}: {}", user_id, e);
            }
            result
        }
    })
}

/// Which module owns a callback button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackRoute {
    Start,
    LinkClose,
    CopyBatch,
    ForceSubTryAgain,
    ForceSubAdmin,
    Settings,
    Panel,
    AdminsRefresh,
    UsersRefresh,
    Close,
    Broadcast,
    Shortener,
    ShortlinkCopy,
    Unknown,
}

pub fn route_callback(data: &str) -> CallbackRoute {
    match data {
        "fsub_try_again" => CallbackRoute::ForceSubTryAgain,
        "admins_refresh" => CallbackRoute::AdminsRefresh,
        "users_refresh" => CallbackRoute::UsersRefresh,
        "users_close" | "admins_close" | "ban_close" => CallbackRoute::Close,
        "admin_back" | "admin_okay" | "close_msg" => CallbackRoute::Panel,
        _ if data.starts_with("start_") => CallbackRoute::Start,
        _ if data.starts_with("link_close:") => CallbackRoute::LinkClose,
        _ if data.starts_with("copy_batch_") => CallbackRoute::CopyBatch,
        _ if data.starts_with("fsub_") => CallbackRoute::ForceSubAdmin,
        _ if data.starts_with("settings_") || data.starts_with("auto_delete_") || data.starts_with("protect_") => {
            CallbackRoute::Settings
        }
        _ if data.starts_with("panel_") || data.starts_with("expired_") => CallbackRoute::Panel,
        _ if data.starts_with("broadcast_") => CallbackRoute::Broadcast,
        _ if data.starts_with("shortlink_copy_") => CallbackRoute::ShortlinkCopy,
        _ if data.starts_with("shortener_") => CallbackRoute::Shortener,
        _ => CallbackRoute::Unknown,
    }
}

/// Handler for callback queries (inline keyboard buttons)
fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            let user_id = ui::uid(&q.from);
            if deps.storage.banned.load().await.is_banned(user_id) {
                ui::answer(&bot, &q, Some("🚫 You have been banned from using this bot!"), true).await;
                return Ok(());
            }
            let data = q.data.clone().unwrap_or_default();
            let result = dispatch_callback(&bot, &q, &deps, &data).await;
            if let Err(e) = &result {
                log::error!("Callback {} failed for {}: {}", data, user_id, e);
            }
            result
        }
    })
}

async fn dispatch_callback(bot: &Bot, q: &CallbackQuery, deps: &HandlerDeps, data: &str) -> HandlerResult {
    match route_callback(data) {
        CallbackRoute::Start => start::on_start_callback(bot, q, deps, data).await,
        CallbackRoute::LinkClose => start::on_link_close(bot, q, data).await,
        CallbackRoute::CopyBatch => links::on_copy_batch(bot, q, deps, data).await,
        CallbackRoute::ForceSubTryAgain => force_sub::on_try_again(bot, q, deps).await,
        CallbackRoute::ForceSubAdmin => force_sub::on_admin_callback(bot, q, deps, data).await,
        CallbackRoute::Settings => settings::on_callback(bot, q, deps, data).await,
        CallbackRoute::Panel => admin::on_panel_callback(bot, q, deps, data).await,
        CallbackRoute::AdminsRefresh => admin::on_admins_refresh(bot, q, deps).await,
        CallbackRoute::UsersRefresh => users::on_refresh(bot, q, deps).await,
        CallbackRoute::Close => {
            ui::close_callback_message(bot, q).await;
            Ok(())
        }
        CallbackRoute::Broadcast => broadcast::on_callback(bot, q, deps, data).await,
        CallbackRoute::Shortener => shortener::on_callback(bot, q, deps, data).await,
        CallbackRoute::ShortlinkCopy => shortener::on_shortlink_copy(bot, q, data).await,
        CallbackRoute::Unknown => {
            log::debug!("Unhandled callback data: {}", data);
            ui::answer(bot, q, None, false).await;
            Ok(())
        }
    }
}
