/*!
 * Term dictionary for Korean/Chinese business documents.
 *
 * Lookup first tries the whole (trimmed) text, then substitutes every known
 * phrase inside it, longest phrases first so that a short term never breaks
 * up a longer one containing it.
 */

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;

use crate::language_utils::Direction;

/// Result of a dictionary lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryMatch {
    /// Text after substitution
    pub text: String,
    /// Whether at least one entry applied
    pub matched_any: bool,
}

/// A bidirectional phrase table the resolver consults before any backend
pub trait TermTable: Send + Sync {
    /// Substitute known phrases of `text` for the given direction
    fn lookup(&self, text: &str, direction: Direction) -> DictionaryMatch;

    /// Number of entries available for a direction
    fn entry_count(&self, direction: Direction) -> usize;
}

/// Built-in Korean -> Chinese vocabulary. The Chinese -> Korean side is
/// derived from it; when two Korean terms share a rendering the later one wins.
const BUILTIN_KO_ZH: &[(&str, &str)] = &[
    // order form
    ("발주서", "订单书"),
    ("수주처", "接单处"),
    ("상호", "商号"),
    ("대표", "代表"),
    ("발주일", "订单日期"),
    ("이메일", "邮箱"),
    ("연락처", "联系方式"),
    ("주소", "地址"),
    ("납기일자", "交货日期"),
    ("발송정보", "配送信息"),
    ("발송일", "发货日"),
    ("품목", "品目"),
    ("단위", "单位"),
    ("수량", "数量"),
    ("구분", "区分"),
    ("비고", "备注"),
    ("합계", "合计"),
    ("요구사항", "要求事项"),
    ("확인", "确认"),
    ("아래와 같이 발주합니다", "订单如下"),
    // company details
    ("주식회사", "股份有限公司"),
    ("테클라스트코리아", "泰克拉斯特韩国"),
    ("이상모", "李相模"),
    ("등록번호", "注册号码"),
    ("경기도", "京畿道"),
    ("광명시", "光明市"),
    ("하안로", "下安路"),
    ("광명테크노파크", "光明科技园"),
    ("서비스", "服务"),
    ("도소매", "批发零售"),
    ("종목", "种目"),
    ("태블릿PC", "平板电脑"),
    ("유재건부장", "刘在建部长"),
    ("심대용과장", "沈大龙科长"),
    ("반입분", "入库分"),
    ("남품장소", "南品场所"),
    ("남품일정", "南品日程"),
    ("전화번호", "电话号码"),
    // general office vocabulary
    ("회사", "公司"),
    ("기업", "企业"),
    ("제품", "产品"),
    ("상품", "商品"),
    ("가격", "价格"),
    ("금액", "金额"),
    ("비용", "费用"),
    ("날짜", "日期"),
    ("시간", "时间"),
    ("장소", "地点"),
    ("위치", "位置"),
    ("담당자", "负责人"),
    ("관리자", "管理者"),
    ("직원", "职员"),
    ("부장", "部长"),
    ("과장", "科长"),
    ("대리", "代理"),
    ("사원", "职员"),
    ("팀장", "组长"),
    ("부서", "部门"),
    ("팀", "团队"),
    ("업무", "业务"),
    ("작업", "工作"),
    ("계획", "计划"),
    ("예정", "预定"),
    ("완료", "完成"),
    ("진행", "进行"),
    ("시작", "开始"),
    ("종료", "结束"),
    ("처리", "处理"),
    ("검토", "审查"),
    ("승인", "批准"),
    ("취소", "取消"),
    ("수정", "修改"),
    ("변경", "变更"),
    ("추가", "添加"),
    ("삭제", "删除"),
    ("입력", "输入"),
    ("출력", "输出"),
    ("전송", "传送"),
    ("수신", "接收"),
    ("발신", "发送"),
    ("문서", "文件"),
    ("서류", "资料"),
    ("양식", "格式"),
    ("형식", "格式"),
    ("내용", "内容"),
    ("정보", "信息"),
    ("데이터", "数据"),
    ("자료", "资料"),
    ("참고", "参考"),
    ("첨부", "附件"),
    ("링크", "链接"),
    ("연결", "连接"),
    ("접속", "连接"),
    ("로그인", "登录"),
    ("로그아웃", "退出"),
    ("계정", "账户"),
    ("사용자", "用户"),
    ("고객", "客户"),
    ("구매자", "购买者"),
    ("판매자", "销售者"),
    ("공급자", "供应商"),
    ("제조사", "制造商"),
    ("생산자", "生产者"),
    ("배송", "配送"),
    ("운송", "运输"),
    ("물류", "物流"),
    ("창고", "仓库"),
    ("재고", "库存"),
    ("입고", "入库"),
    ("출고", "出库"),
    ("검사", "检查"),
    ("품질", "质量"),
    ("검증", "验证"),
    ("테스트", "测试"),
    ("시험", "试验"),
    ("결과", "结果"),
    ("성과", "成果"),
    ("실적", "业绩"),
    ("성공", "成功"),
    ("실패", "失败"),
    ("오류", "错误"),
    ("문제", "问题"),
    ("해결", "解决"),
    ("개선", "改善"),
    ("향상", "提升"),
    ("발전", "发展"),
    ("성장", "成长"),
    ("확대", "扩大"),
    ("축소", "缩小"),
    ("증가", "增加"),
    ("감소", "减少"),
    ("상승", "上升"),
    ("하락", "下降"),
    ("안정", "稳定"),
    ("변동", "变动"),
    ("조정", "调整"),
    ("설정", "设定"),
    ("구성", "构成"),
    ("설치", "安装"),
    ("제거", "删除"),
    ("업데이트", "更新"),
    ("업그레이드", "升级"),
    ("다운로드", "下载"),
    ("업로드", "上传"),
    ("저장", "保存"),
    ("백업", "备份"),
    ("복원", "恢复"),
    ("복사", "复制"),
    ("이동", "移动"),
    ("붙여넣기", "粘贴"),
    ("잘라내기", "剪切"),
    ("선택", "选择"),
    ("취소선택", "取消选择"),
    ("전체선택", "全部选择"),
    ("검색", "搜索"),
    ("찾기", "查找"),
    ("필터", "筛选"),
    ("정렬", "排序"),
    ("분류", "分类"),
    ("그룹", "组"),
    ("카테고리", "类别"),
    ("항목", "项目"),
    ("목록", "列表"),
    ("리스트", "列表"),
    ("메뉴", "菜单"),
    ("옵션", "选项"),
    ("설정값", "设定值"),
    ("기본값", "默认值"),
    ("최대값", "最大值"),
    ("최소값", "最小值"),
    ("평균값", "平均值"),
    ("합계값", "合计值"),
    ("총계", "总计"),
    ("소계", "小计"),
    ("세부내역", "详细内容"),
    ("상세정보", "详细信息"),
    ("요약", "摘要"),
    ("개요", "概要"),
    ("소개", "介绍"),
    ("설명", "说明"),
    ("안내", "指导"),
    ("지침", "指南"),
    ("규칙", "规则"),
    ("규정", "规定"),
    ("정책", "政策"),
    ("방침", "方针"),
    ("원칙", "原则"),
    ("기준", "标准"),
    ("조건", "条件"),
    ("필수사항", "必需事项"),
    ("선택사항", "选择事项"),
    ("권장사항", "推荐事项"),
    ("주의사항", "注意事项"),
    ("경고", "警告"),
    ("알림", "通知"),
    ("공지", "通知"),
    ("발표", "发表"),
    ("보고", "报告"),
    ("발표자료", "发表资料"),
    ("보고서", "报告书"),
    ("제안서", "提案书"),
    ("계획서", "计划书"),
    ("명세서", "明细书"),
    ("사양서", "规格书"),
    ("지시서", "指示书"),
    ("안내서", "指南书"),
];

/// One direction of the dictionary
#[derive(Debug, Clone, Default)]
struct TermList {
    exact: HashMap<String, String>,
    /// Longest key first; equal lengths keep insertion order
    by_length: Vec<(String, String)>,
}

impl TermList {
    /// Build from pairs; a repeated key keeps its first position but takes the last value
    fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut ordered: Vec<(String, String)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for (key, value) in pairs {
            let key = key.into();
            let value = value.into();
            if key.trim().is_empty() {
                continue;
            }
            match index.get(&key) {
                Some(&pos) => ordered[pos].1 = value,
                None => {
                    index.insert(key.clone(), ordered.len());
                    ordered.push((key, value));
                }
            }
        }
        let exact = ordered.iter().cloned().collect();
        let mut by_length = ordered;
        by_length.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));
        Self { exact, by_length }
    }

    fn lookup(&self, text: &str) -> DictionaryMatch {
        let trimmed = text.trim();
        if let Some(exact) = self.exact.get(trimmed) {
            return DictionaryMatch {
                text: exact.clone(),
                matched_any: true,
            };
        }

        let mut working = trimmed.to_string();
        let mut matched_any = false;
        for (key, value) in &self.by_length {
            if working.contains(key.as_str()) {
                working = working.replace(key.as_str(), value);
                matched_any = true;
            }
        }
        DictionaryMatch {
            text: working,
            matched_any,
        }
    }
}

/// The default `TermTable`: Korean <-> Chinese phrase lists
#[derive(Debug, Clone, Default)]
pub struct TranslationDictionary {
    ko_to_zh: TermList,
    zh_to_ko: TermList,
}

impl TranslationDictionary {
    /// Dictionary built from the bundled vocabulary
    pub fn builtin() -> Self {
        Self::from_pairs(
            BUILTIN_KO_ZH.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            Vec::new(),
        )
    }

    /// Build from Korean->Chinese and Chinese->Korean pairs.
    /// Each side starts as the inverse of the other list and its own explicit
    /// pairs override that, so a term given in one direction only still
    /// resolves both ways.
    pub fn from_pairs(ko_to_zh: Vec<(String, String)>, zh_to_ko: Vec<(String, String)>) -> Self {
        let forward: Vec<(String, String)> = inverted(&zh_to_ko).chain(ko_to_zh.iter().cloned()).collect();
        let reverse: Vec<(String, String)> = inverted(&ko_to_zh).chain(zh_to_ko).collect();
        Self {
            ko_to_zh: TermList::from_pairs(forward),
            zh_to_ko: TermList::from_pairs(reverse),
        }
    }

    /// Load the bundled vocabulary extended by an optional base file and an
    /// optional custom file. Later sources override earlier ones; missing
    /// files are skipped.
    ///
    /// File layout: `{ "ko_to_zh": { "<category>": { "<src>": "<dst>" } }, "zh_to_ko": { ... } }`
    pub fn load_from_files(base: Option<&Path>, custom: Option<&Path>) -> Result<Self> {
        let mut ko_to_zh: Vec<(String, String)> = BUILTIN_KO_ZH
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut zh_to_ko: Vec<(String, String)> = Vec::new();

        for path in [base, custom].into_iter().flatten() {
            if !path.exists() {
                debug!("Dictionary file not found, skipping: {:?}", path);
                continue;
            }
            let sections = read_dictionary_file(path)?;
            for (direction, pairs) in sections {
                match direction {
                    Direction::KoToZh => ko_to_zh.extend(pairs),
                    Direction::ZhToKo => zh_to_ko.extend(pairs),
                }
            }
            info!("Loaded dictionary file {:?}", path);
        }

        Ok(Self::from_pairs(ko_to_zh, zh_to_ko))
    }

    fn list(&self, direction: Direction) -> &TermList {
        match direction {
            Direction::KoToZh => &self.ko_to_zh,
            Direction::ZhToKo => &self.zh_to_ko,
        }
    }
}

impl TermTable for TranslationDictionary {
    fn lookup(&self, text: &str, direction: Direction) -> DictionaryMatch {
        self.list(direction).lookup(text)
    }

    fn entry_count(&self, direction: Direction) -> usize {
        self.list(direction).exact.len()
    }
}

fn inverted(pairs: &[(String, String)]) -> impl Iterator<Item = (String, String)> + '_ {
    pairs.iter().map(|(source, target)| (target.clone(), source.clone()))
}

/// Read a category-grouped dictionary file. Non-object categories are ignored.
fn read_dictionary_file(path: &Path) -> Result<Vec<(Direction, Vec<(String, String)>)>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dictionary file: {:?}", path))?;
    let root: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse dictionary file: {:?}", path))?;

    let mut sections = Vec::new();
    let Some(directions) = root.as_object() else {
        warn!("Dictionary file {:?} is not a JSON object, ignoring", path);
        return Ok(sections);
    };
    for (key, categories) in directions {
        let Ok(direction) = key.parse::<Direction>() else {
            warn!("Unknown dictionary direction '{}' in {:?}", key, path);
            continue;
        };
        let mut pairs = Vec::new();
        for words in categories.as_object().into_iter().flat_map(|c| c.values()) {
            for (source, target) in words.as_object().into_iter().flatten() {
                if let Some(target) = target.as_str() {
                    pairs.push((source.clone(), target.to_string()));
                }
            }
        }
        sections.push((direction, pairs));
    }
    Ok(sections)
}

/// Add one entry to a custom dictionary file, creating the file if needed
pub fn add_custom_translation(
    path: &Path,
    direction: Direction,
    category: &str,
    source: &str,
    target: &str,
) -> Result<()> {
    let mut root = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read dictionary file: {:?}", path))?;
        serde_json::from_str::<Value>(&content)
            .with_context(|| format!("Failed to parse dictionary file: {:?}", path))?
    } else {
        Value::Object(Map::new())
    };

    let Some(directions) = root.as_object_mut() else {
        anyhow::bail!("Dictionary file {:?} is not a JSON object", path);
    };
    let categories = directions
        .entry(direction.as_str())
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(categories) = categories.as_object_mut() else {
        anyhow::bail!("Direction '{}' in {:?} is not an object", direction, path);
    };
    let words = categories
        .entry(category)
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(words) = words.as_object_mut() else {
        anyhow::bail!("Category '{}' in {:?} is not an object", category, path);
    };
    words.insert(source.to_string(), Value::String(target.to_string()));

    if let Some(parent) = path.parent() {
        crate::file_utils::FileManager::ensure_dir(parent)?;
    }
    let json = serde_json::to_string_pretty(&root).context("Failed to serialize dictionary")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write dictionary file: {:?}", path))?;
    Ok(())
}
