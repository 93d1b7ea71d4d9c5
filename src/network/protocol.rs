use renet2::{ChannelConfig, SendType};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::components::{ButtonState, WeaponInput, WeaponState};
use crate::error::GunplayResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Snapshots, latest wins
    Unreliable,
    /// Commands, every press edge must arrive
    ReliableOrdered,
}

impl From<Channel> for u8 {
    fn from(channel: Channel) -> u8 {
        match channel {
            Channel::Unreliable => 0,
            Channel::ReliableOrdered => 1,
        }
    }
}

impl Channel {
    pub fn id(&self) -> u8 {
        (*self).into()
    }

    pub fn config() -> Vec<ChannelConfig> {
        vec![
            ChannelConfig {
                channel_id: Channel::Unreliable.id(),
                max_memory_usage_bytes: 5 * 1024 * 1024,
                send_type: SendType::Unreliable,
            },
            ChannelConfig {
                channel_id: Channel::ReliableOrdered.id(),
                max_memory_usage_bytes: 5 * 1024 * 1024,
                send_type: SendType::ReliableOrdered {
                    resend_time: Duration::from_millis(200),
                },
            },
        ]
    }
}

/// One tick of a client's weapon input.
///
/// # Fields
/// * `weapon` - Network id of the weapon being driven
/// * `input_tick` - Client tick the input was sampled on
/// * `pitch` / `yaw` - Client aim after its local recoil
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeaponCommand {
    pub weapon: u64,
    pub input_tick: u64,
    pub primary: ButtonState,
    pub secondary: ButtonState,
    pub reload: ButtonState,
    pub drop: ButtonState,
    pub drop_modifier: bool,
    pub pitch: f32,
    pub yaw: f32,
}

impl WeaponCommand {
    pub fn from_input(weapon: u64, input_tick: u64, input: &WeaponInput, pitch: f32, yaw: f32) -> Self {
        Self {
            weapon,
            input_tick,
            primary: input.primary,
            secondary: input.secondary,
            reload: input.reload,
            drop: input.drop,
            drop_modifier: input.drop_modifier,
            pitch,
            yaw,
        }
    }

    /// Folds this command into the server-side input.
    ///
    /// Press edges accumulate until the simulation consumes them, so two
    /// commands landing between fixed ticks cannot swallow a press.
    pub fn apply_to(&self, input: &mut WeaponInput) {
        merge_button(&mut input.primary, self.primary);
        merge_button(&mut input.secondary, self.secondary);
        merge_button(&mut input.reload, self.reload);
        merge_button(&mut input.drop, self.drop);
        input.drop_modifier = self.drop_modifier;
        input.input_tick = Some(self.input_tick);
        input.remote_aim = true;
    }
}

fn merge_button(current: &mut ButtonState, incoming: ButtonState) {
    current.pressed |= incoming.pressed;
    current.held = incoming.held;
}

/// Authoritative weapon state at one server tick.
///
/// # Fields
/// * `acked_input_tick` - Newest client input tick the server had applied to
///   this weapon, `None` when no client drives it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeaponStateSnapshot {
    pub weapon: u64,
    pub tick: u64,
    pub acked_input_tick: Option<u64>,
    pub ammo_in_clip: u32,
    pub reserve_ammo: u32,
    pub is_reloading: bool,
    pub unlimited_ammo: bool,
}

impl WeaponStateSnapshot {
    pub fn capture(
        weapon: u64,
        tick: u64,
        acked_input_tick: Option<u64>,
        state: &WeaponState,
    ) -> Self {
        Self {
            weapon,
            tick,
            acked_input_tick,
            ammo_in_clip: state.ammo_in_clip,
            reserve_ammo: state.reserve_ammo,
            is_reloading: state.is_reloading,
            unlimited_ammo: state.unlimited_ammo,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    Command(WeaponCommand),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    Snapshot {
        tick: u64,
        weapons: Vec<WeaponStateSnapshot>,
    },
}

pub fn encode<T: Serialize>(message: &T) -> GunplayResult<Vec<u8>> {
    Ok(bincode::serialize(message)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> GunplayResult<T> {
    Ok(bincode::deserialize(bytes)?)
}
