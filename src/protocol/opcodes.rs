//! Client opcode table and wire constants tied to specific opcodes.

/// Relay markers written at the sub-type offset of a forwarded movement frame
pub mod markers {
    pub const MOVE: u8 = 0x02;
    pub const STOP: u8 = 0x04;
    pub const JUMP: u8 = 0x06;
}

/// Every client-to-server opcode the world server handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    ConnectWorldServer = 0x0201,
    KeepAlive = 0x0203,
    RequestLogout = 0x0205,

    CharacterInfoRequest = 0x0301,
    UpdateSpecialOptionList = 0x0303,
    PlayersRequest = 0x0305,
    ChannelInfo = 0x0307,

    MovementMove = 0x0501,
    MovementStop = 0x0503,
    MovementJump = 0x0505,

    CancelGesture = 0x0601,
    DoGesture = 0x0603,
    GestureSlotUpdate = 0x0605,

    ChatNormal = 0x0701,

    ItemInventoryInfo = 0x0801,
    ItemMove = 0x0803,
    ItemCombine = 0x0805,
    ItemDivide = 0x0807,
    ItemBreak = 0x0809,
    ItemUse = 0x080B,
    ItemUpgrade = 0x080D,
    ItemUpdateSlotInfo = 0x080F,
}

impl Opcode {
    pub const ALL: [Opcode; 22] = [
        Opcode::ConnectWorldServer,
        Opcode::KeepAlive,
        Opcode::RequestLogout,
        Opcode::CharacterInfoRequest,
        Opcode::UpdateSpecialOptionList,
        Opcode::PlayersRequest,
        Opcode::ChannelInfo,
        Opcode::MovementMove,
        Opcode::MovementStop,
        Opcode::MovementJump,
        Opcode::CancelGesture,
        Opcode::DoGesture,
        Opcode::GestureSlotUpdate,
        Opcode::ChatNormal,
        Opcode::ItemInventoryInfo,
        Opcode::ItemMove,
        Opcode::ItemCombine,
        Opcode::ItemDivide,
        Opcode::ItemBreak,
        Opcode::ItemUse,
        Opcode::ItemUpgrade,
        Opcode::ItemUpdateSlotInfo,
    ];

    pub fn from_u16(value: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| *op as u16 == value)
    }

    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Server-to-client opcodes emitted by the response encoder
pub mod server {
    pub const SERVER_DATE: u16 = 0x0202;
    pub const KEEP_ALIVE: u16 = 0x0204;
    pub const LOGIN_SERVER_REDIRECT: u16 = 0x0206;
    pub const SERVER_VERSION: u16 = 0x0208;
    pub const ENTER_GAME_SERVER: u16 = 0x020A;

    pub const CHARACTER_INFO: u16 = 0x0302;
    pub const SPECIAL_OPTION_LIST: u16 = 0x0304;
    pub const PLAYER_INFO: u16 = 0x0306;
    pub const CHANNEL_INFO: u16 = 0x0308;
    pub const LOAD_TITLE: u16 = 0x030A;
    pub const UPDATE_TITLE: u16 = 0x030C;

    pub const CANCEL_GESTURE: u16 = 0x0602;
    pub const DO_GESTURE: u16 = 0x0604;
    pub const GESTURE_SLOTS: u16 = 0x0606;

    pub const ITEM_INVENTORY: u16 = 0x0802;
    pub const ITEM_OPEN_SLOT_INFO: u16 = 0x0804;
    pub const ITEM_BANK_INFO: u16 = 0x0806;
}
