mod frame_codec;
mod sequence;

pub use self::frame_codec::{
    FRAME_END, FRAME_START, FrameCodec, FrameCodecError, NotificationFrame,
};
pub(crate) use self::frame_codec::{SET_MODE_MODE_OFFSET, SET_MODE_TARGET_OFFSET};
pub use self::sequence::{CommandSequence, SEQUENCE_MAX};
