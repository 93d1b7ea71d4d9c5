//! Systems module - weapon rules and the ECS systems that run them.

pub mod ammo;
pub mod ballistics;
pub mod damage;
pub mod debug;
pub mod fire_control;
pub mod lag_compensation;
pub mod recoil;
pub mod simulation;
