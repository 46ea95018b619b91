use block2::RcBlock;
use objc2::rc::Retained;
use objc2::runtime::AnyObject;
use objc2_media_player::{
    MPChangePlaybackPositionCommandEvent, MPRemoteCommandCenter, MPRemoteCommandEvent,
    MPRemoteCommandHandlerStatus,
};
use std::ptr::NonNull;
use tokio::sync::mpsc::UnboundedSender;

use crate::bridge::remote::RemoteCommand;

/// Register media key handlers with the system. Each key press is sent as a
/// `RemoteCommand` on `commands`.
/// Returns tokens that MUST be kept alive for the handlers to remain active.
pub fn register_media_key_handlers(
    commands: UnboundedSender<RemoteCommand>,
) -> Vec<Retained<AnyObject>> {
    let mut tokens = Vec::new();

    unsafe {
        let command_center = MPRemoteCommandCenter::sharedCommandCenter();

        // Play command
        let play_cmd = command_center.playCommand();
        play_cmd.setEnabled(true);
        let tx = commands.clone();
        let play_block = RcBlock::new(
            move |_event: NonNull<MPRemoteCommandEvent>| -> MPRemoteCommandHandlerStatus {
                let _ = tx.send(RemoteCommand::Play);
                MPRemoteCommandHandlerStatus::Success
            },
        );
        tokens.push(play_cmd.addTargetWithHandler(&play_block));

        // Pause command
        let pause_cmd = command_center.pauseCommand();
        pause_cmd.setEnabled(true);
        let tx = commands.clone();
        let pause_block = RcBlock::new(
            move |_event: NonNull<MPRemoteCommandEvent>| -> MPRemoteCommandHandlerStatus {
                let _ = tx.send(RemoteCommand::Pause);
                MPRemoteCommandHandlerStatus::Success
            },
        );
        tokens.push(pause_cmd.addTargetWithHandler(&pause_block));

        // Toggle play/pause command
        let toggle_cmd = command_center.togglePlayPauseCommand();
        toggle_cmd.setEnabled(true);
        let tx = commands.clone();
        let toggle_block = RcBlock::new(
            move |_event: NonNull<MPRemoteCommandEvent>| -> MPRemoteCommandHandlerStatus {
                let _ = tx.send(RemoteCommand::Toggle);
                MPRemoteCommandHandlerStatus::Success
            },
        );
        tokens.push(toggle_cmd.addTargetWithHandler(&toggle_block));

        // Next track command
        let next_cmd = command_center.nextTrackCommand();
        next_cmd.setEnabled(true);
        let tx = commands.clone();
        let next_block = RcBlock::new(
            move |_event: NonNull<MPRemoteCommandEvent>| -> MPRemoteCommandHandlerStatus {
                let _ = tx.send(RemoteCommand::Next);
                MPRemoteCommandHandlerStatus::Success
            },
        );
        tokens.push(next_cmd.addTargetWithHandler(&next_block));

        // Previous track command
        let prev_cmd = command_center.previousTrackCommand();
        prev_cmd.setEnabled(true);
        let tx = commands.clone();
        let prev_block = RcBlock::new(
            move |_event: NonNull<MPRemoteCommandEvent>| -> MPRemoteCommandHandlerStatus {
                let _ = tx.send(RemoteCommand::Previous);
                MPRemoteCommandHandlerStatus::Success
            },
        );
        tokens.push(prev_cmd.addTargetWithHandler(&prev_block));

        // Scrubbing from the Now Playing widget
        let seek_cmd = command_center.changePlaybackPositionCommand();
        seek_cmd.setEnabled(true);
        let tx = commands.clone();
        let seek_block = RcBlock::new(
            move |event: NonNull<MPRemoteCommandEvent>| -> MPRemoteCommandHandlerStatus {
                let event = event.as_ref();
                match event.downcast_ref::<MPChangePlaybackPositionCommandEvent>() {
                    Some(position) => {
                        let _ = tx.send(RemoteCommand::SeekTo(position.positionTime()));
                        MPRemoteCommandHandlerStatus::Success
                    }
                    None => MPRemoteCommandHandlerStatus::CommandFailed,
                }
            },
        );
        tokens.push(seek_cmd.addTargetWithHandler(&seek_block));
    }

    log::info!("Media key handlers registered ({} tokens)", tokens.len());
    tokens
}
