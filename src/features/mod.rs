/// 分享图绘制：构图指令树、布局规则、六种样式与栅格化
pub mod image;

/// 分享会话：数据装配、取色、预渲染缓存
pub mod share;
